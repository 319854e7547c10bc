//! Per-entity push outcomes.

use crate::entity::Entity;
use crate::gateway::{GatewayError, GatewayErrorKind};
use crate::operation::SyncOperation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a single queue entry failed to push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushErrorKind {
    /// The remote call failed.
    Gateway(GatewayErrorKind),
    /// The queue entry holds an operation this version cannot replay.
    OperationNotRecognized,
    /// The entity referenced by the entry is no longer cached.
    EntityMissing,
    /// Reading or writing local state failed.
    Local,
}

/// Error attached to a failed [`PushResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushError {
    /// Failure classification.
    pub kind: PushErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl PushError {
    /// Creates a push error.
    pub fn new(kind: PushErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns true if retrying the push later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            PushErrorKind::Gateway(kind) => matches!(
                kind,
                GatewayErrorKind::NetworkConnection
                    | GatewayErrorKind::Timeout
                    | GatewayErrorKind::Server
            ),
            PushErrorKind::Local => true,
            PushErrorKind::OperationNotRecognized | PushErrorKind::EntityMissing => false,
        }
    }

    /// Returns true if the remote could not be reached.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self.kind,
            PushErrorKind::Gateway(GatewayErrorKind::NetworkConnection | GatewayErrorKind::Timeout)
        )
    }
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<GatewayError> for PushError {
    fn from(err: GatewayError) -> Self {
        Self::new(PushErrorKind::Gateway(err.kind), err.message)
    }
}

/// Outcome of pushing one queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResult {
    /// Id of the entity the entry applied to (the pre-push id for creates).
    #[serde(rename = "_id")]
    pub id: String,
    /// Operation that was replayed.
    pub operation: SyncOperation,
    /// Server copy on success, or the local copy on a failed create/update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
    /// Set when the entry failed and is still queued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PushError>,
}

impl PushResult {
    /// Creates a successful result.
    pub fn success(id: impl Into<String>, operation: SyncOperation, entity: Option<Entity>) -> Self {
        Self {
            id: id.into(),
            operation,
            entity,
            error: None,
        }
    }

    /// Creates a failed result.
    pub fn failure(
        id: impl Into<String>,
        operation: SyncOperation,
        entity: Option<Entity>,
        error: PushError,
    ) -> Self {
        Self {
            id: id.into(),
            operation,
            entity,
            error: Some(error),
        }
    }

    /// Returns true if the entry was reconciled.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_by_kind() {
        let offline: PushError = GatewayError::network("down").into();
        assert!(offline.is_retryable());
        assert!(offline.is_connectivity());

        let denied = PushError::new(
            PushErrorKind::Gateway(GatewayErrorKind::Unauthorized),
            "no session",
        );
        assert!(!denied.is_retryable());

        let corrupt = PushError::new(PushErrorKind::OperationNotRecognized, "MERGE");
        assert!(!corrupt.is_retryable());
    }

    #[test]
    fn success_and_failure_constructors() {
        let ok = PushResult::success("e1", SyncOperation::Delete, None);
        assert!(ok.is_success());

        let failed = PushResult::failure(
            "e2",
            SyncOperation::Create,
            Some(Entity::with_id("e2")),
            GatewayError::server("boom").into(),
        );
        assert!(!failed.is_success());
        assert_eq!(failed.error.unwrap().message, "boom");
    }
}
