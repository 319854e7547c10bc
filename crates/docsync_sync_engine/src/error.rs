//! Error types for the sync engine and data stores.

use docsync_core::CoreError;
use docsync_protocol::{GatewayError, ProtocolError, PushError, PushErrorKind};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync and store operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Input was rejected before any I/O took place.
    #[error("validation error: {0}")]
    Validation(String),

    /// A precondition protecting local data does not hold.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// Another push of the same collection has not finished yet.
    #[error("a push is already in progress for {collection}")]
    PushInProgress {
        /// Namespace key of the collection.
        collection: String,
    },

    /// A queue entry holds an operation this version cannot replay.
    #[error("sync operation {operation:?} not recognized")]
    OperationNotRecognized {
        /// The persisted operation name.
        operation: String,
    },

    /// A queued entity is no longer in the local cache.
    #[error("entity {entity_id} of {collection} is no longer cached")]
    EntityMissing {
        /// Collection name.
        collection: String,
        /// Entity id.
        entity_id: String,
    },

    /// The remote gateway failed.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Pushing an entity failed.
    #[error("push failed: {0}")]
    Push(PushError),

    /// Local store error.
    #[error("local store error: {0}")]
    Core(#[from] CoreError),

    /// Document model error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A document did not match the expected shape.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a data integrity error.
    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity(message.into())
    }

    /// Returns true for errors raised before any I/O.
    pub fn is_validation(&self) -> bool {
        match self {
            SyncError::Validation(_) => true,
            SyncError::Core(err) => err.is_validation(),
            SyncError::Protocol(ProtocolError::InvalidQuery(_)) => true,
            _ => false,
        }
    }

    /// Returns true for data integrity violations.
    pub fn is_data_integrity(&self) -> bool {
        match self {
            SyncError::DataIntegrity(_) => true,
            SyncError::Core(err) => err.is_data_integrity(),
            _ => false,
        }
    }

    /// Returns true if the remote could not be reached.
    pub fn is_connectivity(&self) -> bool {
        match self {
            SyncError::Gateway(err) => err.is_connectivity(),
            SyncError::Push(err) => err.is_connectivity(),
            _ => false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::PushInProgress { .. } => true,
            SyncError::Push(err) => err.is_retryable(),
            SyncError::Gateway(_) => self.to_push_error().is_retryable(),
            SyncError::Core(CoreError::Storage(_)) => true,
            _ => false,
        }
    }

    /// Converts the error into the per-entity form carried by a push result.
    pub fn to_push_error(&self) -> PushError {
        match self {
            SyncError::Gateway(err) => err.clone().into(),
            SyncError::Push(err) => err.clone(),
            SyncError::OperationNotRecognized { .. } => {
                PushError::new(PushErrorKind::OperationNotRecognized, self.to_string())
            }
            SyncError::EntityMissing { .. } => {
                PushError::new(PushErrorKind::EntityMissing, self.to_string())
            }
            _ => PushError::new(PushErrorKind::Local, self.to_string()),
        }
    }
}
