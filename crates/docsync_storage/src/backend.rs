//! Keyed document store trait definition.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use serde_json::Value;

/// The field every stored document is keyed by.
pub const ID_FIELD: &str = "_id";

/// A namespaced table of JSON documents keyed by `_id`.
///
/// Stores are **opaque document tables**. A namespace is created implicitly
/// on first write and holds at most one document per `_id`. Stores never
/// inspect fields other than `_id`.
///
/// # Invariants
///
/// - `save` upserts: a document replaces any prior document with the same `_id`
/// - `find` returns every document in the namespace
/// - Operations on different namespaces never observe each other
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
#[async_trait]
pub trait KeyedDocumentStore: Send + Sync {
    /// Returns every document in `namespace`.
    ///
    /// An unknown namespace is empty, not an error.
    async fn find(&self, namespace: &str) -> StorageResult<Vec<Value>>;

    /// Returns the document with the given `_id`, if any.
    async fn find_by_id(&self, namespace: &str, id: &str) -> StorageResult<Option<Value>>;

    /// Upserts `docs` into `namespace` and returns them as stored.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidDocument`] if any document lacks a
    /// non-empty string `_id`. In that case nothing is written.
    async fn save(&self, namespace: &str, docs: Vec<Value>) -> StorageResult<Vec<Value>>;

    /// Deletes the document with the given `_id` and returns how many were
    /// removed (0 or 1).
    async fn remove_by_id(&self, namespace: &str, id: &str) -> StorageResult<usize>;

    /// Deletes every document in `namespace` and returns how many were removed.
    async fn clear(&self, namespace: &str) -> StorageResult<usize>;
}

/// Reads the `_id` key of a document.
///
/// # Errors
///
/// Fails if the document is not an object or `_id` is missing, empty, or not
/// a string.
pub fn document_id(doc: &Value) -> StorageResult<&str> {
    match doc.get(ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.as_str()),
        Some(other) => Err(StorageError::invalid_document(format!(
            "_id must be a non-empty string, got {other}"
        ))),
        None => Err(StorageError::invalid_document("document has no _id")),
    }
}
