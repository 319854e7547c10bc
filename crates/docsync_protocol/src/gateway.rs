//! Remote gateway responses and error kinds.

use crate::entity::Entity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a remote failure.
///
/// Callers branch on the kind rather than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayErrorKind {
    /// The requested entity does not exist on the server.
    NotFound,
    /// The server could not be reached.
    NetworkConnection,
    /// The request timed out.
    Timeout,
    /// The app is not configured for the requested feature.
    MissingConfiguration,
    /// A request parameter is outside the range the server accepts.
    ParameterValueOutOfRange,
    /// Credentials were rejected.
    Unauthorized,
    /// The server failed to process the request.
    Server,
    /// The server response could not be interpreted.
    InvalidResponse,
}

/// A failure reported by the remote gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct GatewayError {
    /// Failure classification.
    pub kind: GatewayErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl GatewayError {
    /// Creates an error of the given kind.
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::NotFound, message)
    }

    /// Creates a connectivity error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::NetworkConnection, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Server, message)
    }

    /// Returns true if the entity does not exist remotely.
    pub fn is_not_found(&self) -> bool {
        self.kind == GatewayErrorKind::NotFound
    }

    /// Returns true if the server could not be reached in time.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self.kind,
            GatewayErrorKind::NetworkConnection | GatewayErrorKind::Timeout
        )
    }

    /// Returns true if delta-set fetching is unavailable for the request.
    pub fn is_delta_set_unsupported(&self) -> bool {
        matches!(
            self.kind,
            GatewayErrorKind::MissingConfiguration | GatewayErrorKind::ParameterValueOutOfRange
        )
    }
}

/// Result of a full fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindResponse {
    /// Matching entities.
    pub entities: Vec<Entity>,
    /// Server-reported request-start token.
    pub request_start: Option<String>,
}

/// Reference to an entity deleted on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedEntity {
    /// Id of the deleted entity.
    #[serde(rename = "_id")]
    pub id: String,
}

/// Result of a delta-set fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaSetResponse {
    /// Entities created or modified since the baseline.
    pub changed: Vec<Entity>,
    /// Entities deleted since the baseline.
    pub deleted: Vec<DeletedEntity>,
    /// Server-reported request-start token.
    pub request_start: Option<String>,
}

/// Result of a remote count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    /// Number of matching entities.
    pub count: usize,
    /// Server-reported request-start token.
    pub request_start: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_predicates() {
        assert!(GatewayError::not_found("x").is_not_found());
        assert!(GatewayError::network("offline").is_connectivity());
        assert!(GatewayError::new(GatewayErrorKind::Timeout, "slow").is_connectivity());
        assert!(!GatewayError::server("boom").is_connectivity());
        assert!(
            GatewayError::new(GatewayErrorKind::MissingConfiguration, "no delta")
                .is_delta_set_unsupported()
        );
        assert!(
            GatewayError::new(GatewayErrorKind::ParameterValueOutOfRange, "since too old")
                .is_delta_set_unsupported()
        );
        assert!(!GatewayError::not_found("x").is_delta_set_unsupported());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = GatewayError::server("internal error");
        assert_eq!(err.to_string(), "Server: internal error");
    }
}
