//! Error types for the local store layer.

use docsync_protocol::ProtocolError;
use docsync_storage::StorageError;
use thiserror::Error;

/// Result type for local store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by caches, the sync queue and the query cache.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input was rejected before any I/O took place.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the rejected input.
        message: String,
    },

    /// A precondition protecting local data does not hold.
    #[error("data integrity error: {message}")]
    DataIntegrity {
        /// Description of the violated precondition.
        message: String,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Query or document model error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A stored document did not match the expected shape.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a data integrity error.
    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity {
            message: message.into(),
        }
    }

    /// Returns true for errors raised before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Protocol(ProtocolError::InvalidQuery(_))
        )
    }

    /// Returns true for data integrity violations.
    pub fn is_data_integrity(&self) -> bool {
        matches!(self, Self::DataIntegrity { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_query_counts_as_validation() {
        let err: CoreError = ProtocolError::invalid_query("bad").into();
        assert!(err.is_validation());
        assert!(!err.is_data_integrity());
    }

    #[test]
    fn display() {
        let err = CoreError::data_integrity("entity has no _id");
        assert_eq!(err.to_string(), "data integrity error: entity has no _id");
    }
}
