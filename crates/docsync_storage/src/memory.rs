//! In-memory document store for testing.

use crate::backend::{document_id, KeyedDocumentStore};
use crate::error::StorageResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

type Table = BTreeMap<String, Value>;

/// An in-memory document store.
///
/// This store keeps every namespace in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral caches that don't need persistence
///
/// Documents within a namespace are returned in `_id` order.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across tasks. No lock is held
/// across an await point.
///
/// # Example
///
/// ```rust
/// use docsync_storage::{InMemoryStore, KeyedDocumentStore};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = InMemoryStore::new();
/// store.save("notes", vec![json!({ "_id": "n1" })]).await.unwrap();
/// assert_eq!(store.len("notes"), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    namespaces: RwLock<HashMap<String, Table>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a namespace.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .get(namespace)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Returns true if the namespace holds no documents.
    #[must_use]
    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }

    /// Returns the names of all namespaces that hold at least one document.
    #[must_use]
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .namespaces
            .read()
            .iter()
            .filter(|(_, table)| !table.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl KeyedDocumentStore for InMemoryStore {
    async fn find(&self, namespace: &str) -> StorageResult<Vec<Value>> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_by_id(&self, namespace: &str, id: &str) -> StorageResult<Option<Value>> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .and_then(|table| table.get(id).cloned()))
    }

    async fn save(&self, namespace: &str, docs: Vec<Value>) -> StorageResult<Vec<Value>> {
        // Validate the whole batch before touching the table.
        let keyed = docs
            .iter()
            .map(|doc| document_id(doc).map(str::to_owned))
            .collect::<StorageResult<Vec<_>>>()?;

        let mut namespaces = self.namespaces.write();
        let table = namespaces.entry(namespace.to_owned()).or_default();
        for (id, doc) in keyed.into_iter().zip(docs.iter()) {
            table.insert(id, doc.clone());
        }
        Ok(docs)
    }

    async fn remove_by_id(&self, namespace: &str, id: &str) -> StorageResult<usize> {
        Ok(self
            .namespaces
            .write()
            .get_mut(namespace)
            .and_then(|table| table.remove(id))
            .map_or(0, |_| 1))
    }

    async fn clear(&self, namespace: &str) -> StorageResult<usize> {
        Ok(self
            .namespaces
            .write()
            .remove(namespace)
            .map_or(0, |table| table.len()))
    }
}
