//! Shared handle to the document backend and its writer queues.

use crate::cache::Cache;
use crate::document::Document;
use crate::namespace::Namespace;
use docsync_storage::{InMemoryStore, KeyedDocumentStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A document backend plus one single-writer queue per namespace.
///
/// Cloning is cheap and every clone shares the same backend and the same
/// writer queues, so two caches opened on one namespace never interleave
/// their writes.
#[derive(Clone)]
pub struct LocalStorage {
    backend: Arc<dyn KeyedDocumentStore>,
    writers: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl LocalStorage {
    /// Wraps a backend.
    pub fn new<S: KeyedDocumentStore + 'static>(backend: S) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    /// Wraps an already shared backend.
    pub fn from_arc(backend: Arc<dyn KeyedDocumentStore>) -> Self {
        Self {
            backend,
            writers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates storage over a fresh [`InMemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(InMemoryStore::new())
    }

    /// Returns the backend.
    pub fn backend(&self) -> &dyn KeyedDocumentStore {
        self.backend.as_ref()
    }

    /// Opens a typed cache over `namespace`.
    pub fn cache<T: Document>(&self, namespace: Namespace) -> Cache<T> {
        Cache::new(self.clone(), namespace)
    }

    /// Returns the writer queue of a namespace key, creating it on first use.
    pub(crate) fn writer(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut writers = self.writers.lock();
        Arc::clone(writers.entry(key.to_owned()).or_default())
    }
}

impl fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStorage")
            .field("namespaces", &self.writers.lock().len())
            .finish_non_exhaustive()
    }
}
