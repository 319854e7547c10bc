//! File-based document store for persistent storage.

use crate::backend::{document_id, KeyedDocumentStore};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::trace;

/// A file-based document store.
///
/// Each namespace is persisted as `<root>/<namespace>.json`, a JSON object
/// mapping `_id` to document. Data survives process restarts.
///
/// # Durability
///
/// Every write rewrites the namespace file through a temporary sibling and
/// an atomic rename, so a crash leaves either the old or the new table on
/// disk, never a torn one.
///
/// # Thread Safety
///
/// Writes are serialized through an internal async mutex. Reads go straight
/// to disk and observe the last completed rename.
///
/// # Example
///
/// ```no_run
/// use docsync_storage::{FileStore, KeyedDocumentStore};
/// use serde_json::json;
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = FileStore::open(Path::new("local-data")).await.unwrap();
/// store.save("books", vec![json!({ "_id": "b1" })]).await.unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens a file store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(root: &Path) -> StorageResult<Self> {
        tokio::fs::create_dir_all(root).await?;
        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_path(&self, namespace: &str) -> StorageResult<PathBuf> {
        let valid = !namespace.is_empty()
            && namespace != "."
            && namespace != ".."
            && !namespace.contains(['/', '\\']);
        if !valid {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid namespace name: {namespace:?}"),
            )));
        }
        Ok(self.root.join(format!("{namespace}.json")))
    }

    async fn load(&self, namespace: &str) -> StorageResult<Map<String, Value>> {
        let path = self.namespace_path(namespace)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice(&bytes)? {
            Value::Object(table) => Ok(table),
            _ => Err(StorageError::Corrupted(format!(
                "{} does not contain a JSON object",
                path.display()
            ))),
        }
    }

    async fn persist(&self, namespace: &str, table: &Map<String, Value>) -> StorageResult<()> {
        let path = self.namespace_path(namespace)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(table)?;

        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        trace!(namespace, documents = table.len(), "persisted namespace");
        Ok(())
    }
}

#[async_trait]
impl KeyedDocumentStore for FileStore {
    async fn find(&self, namespace: &str) -> StorageResult<Vec<Value>> {
        Ok(self.load(namespace).await?.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn find_by_id(&self, namespace: &str, id: &str) -> StorageResult<Option<Value>> {
        Ok(self.load(namespace).await?.remove(id))
    }

    async fn save(&self, namespace: &str, docs: Vec<Value>) -> StorageResult<Vec<Value>> {
        let keyed = docs
            .iter()
            .map(|doc| document_id(doc).map(str::to_owned))
            .collect::<StorageResult<Vec<_>>>()?;

        let _guard = self.write_lock.lock().await;
        let mut table = self.load(namespace).await?;
        for (id, doc) in keyed.into_iter().zip(docs.iter()) {
            table.insert(id, doc.clone());
        }
        self.persist(namespace, &table).await?;
        Ok(docs)
    }

    async fn remove_by_id(&self, namespace: &str, id: &str) -> StorageResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut table = self.load(namespace).await?;
        if table.remove(id).is_none() {
            return Ok(0);
        }
        self.persist(namespace, &table).await?;
        Ok(1)
    }

    async fn clear(&self, namespace: &str) -> StorageResult<usize> {
        let _guard = self.write_lock.lock().await;
        let count = self.load(namespace).await?.len();
        match tokio::fs::remove_file(self.namespace_path(namespace)?).await {
            Ok(()) => Ok(count),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_open_creates_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("store");

        let store = FileStore::open(&root).await.unwrap();
        assert!(root.exists());
        assert_eq!(store.root(), root);
    }

    #[tokio::test]
    async fn file_save_and_find() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store
            .save(
                "books",
                vec![json!({ "_id": "a", "t": 1 }), json!({ "_id": "b", "t": 2 })],
            )
            .await
            .unwrap();

        assert_eq!(store.find("books").await.unwrap().len(), 2);
        let b = store.find_by_id("books", "b").await.unwrap().unwrap();
        assert_eq!(b["t"], 2);
        assert!(store.find_by_id("books", "c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_persistence() {
        let dir = tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store
                .save("kinvey_sync", vec![json!({ "_id": "q1" })])
                .await
                .unwrap();
        }

        {
            let store = FileStore::open(dir.path()).await.unwrap();
            let docs = store.find("kinvey_sync").await.unwrap();
            assert_eq!(docs, vec![json!({ "_id": "q1" })]);
        }
    }

    #[tokio::test]
    async fn file_remove_and_clear() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store
            .save("books", vec![json!({ "_id": "a" }), json!({ "_id": "b" })])
            .await
            .unwrap();

        assert_eq!(store.remove_by_id("books", "a").await.unwrap(), 1);
        assert_eq!(store.remove_by_id("books", "a").await.unwrap(), 0);
        assert_eq!(store.clear("books").await.unwrap(), 1);
        assert_eq!(store.clear("books").await.unwrap(), 0);
        assert!(store.find("books").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_rejects_path_like_namespace() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let result = store.find("../escape").await;
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[tokio::test]
    async fn file_corrupted_namespace_is_reported() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("books.json"), b"[1, 2, 3]").unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let result = store.find("books").await;
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }
}
