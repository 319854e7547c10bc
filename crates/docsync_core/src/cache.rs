//! Typed document cache over one storage namespace.

use crate::document::{generate_id, Document};
use crate::error::{CoreError, CoreResult};
use crate::namespace::Namespace;
use crate::storage::LocalStorage;
use docsync_protocol::{Aggregation, Query};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, trace};

/// Local store of one (collection, tag) namespace.
///
/// Mutating operations (`save`, `remove_by_id`, `remove`, `clear`) are
/// serialized through the namespace's single-writer queue in arrival order.
/// Reads do not wait for queued writes; they observe the namespace either
/// before or after any given write, never in between.
///
/// # Invariants
///
/// - Every stored document has a non-empty `_id`
/// - A document saved without an id gets a generated 24-character id and is
///   passed to [`Document::mark_generated_id`] before it is written
///
/// # Example
///
/// ```rust
/// use docsync_core::{LocalStorage, Namespace};
/// use docsync_protocol::Entity;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let storage = LocalStorage::in_memory();
/// let books = storage.cache::<Entity>(Namespace::new("books", None).unwrap());
///
/// let saved = books.save(Entity::new().with_field("title", json!("Dune"))).await.unwrap();
/// assert!(saved.is_local());
/// assert_eq!(books.count(None).await.unwrap(), 1);
/// # }
/// ```
pub struct Cache<T> {
    storage: LocalStorage,
    namespace: Namespace,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            namespace: self.namespace.clone(),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Cache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").field("namespace", &self.key).finish()
    }
}

impl<T: Document> Cache<T> {
    /// Opens the cache of `namespace` over `storage`.
    pub fn new(storage: LocalStorage, namespace: Namespace) -> Self {
        let key = namespace.key();
        Self {
            storage,
            namespace,
            key,
            _marker: PhantomData,
        }
    }

    /// Returns the namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Returns the storage this cache writes to.
    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Returns the raw documents matching `query`, or all documents.
    ///
    /// # Errors
    ///
    /// Fails with a validation error if the query is malformed.
    pub async fn find_raw(&self, query: Option<&Query>) -> CoreResult<Vec<Value>> {
        if let Some(query) = query {
            query.validate()?;
        }
        let docs = self.storage.backend().find(&self.key).await?;
        Ok(match query {
            Some(query) => query.process(docs),
            None => docs,
        })
    }

    /// Returns the documents matching `query`, or all documents.
    ///
    /// # Errors
    ///
    /// Fails with a validation error if the query is malformed.
    pub async fn find(&self, query: Option<&Query>) -> CoreResult<Vec<T>> {
        self.find_raw(query)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(CoreError::from))
            .collect()
    }

    /// Returns the document with the given id, if cached.
    pub async fn find_by_id(&self, id: &str) -> CoreResult<Option<T>> {
        if id.is_empty() {
            return Ok(None);
        }
        match self.storage.backend().find_by_id(&self.key, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Counts the documents matching `query`, or all documents.
    pub async fn count(&self, query: Option<&Query>) -> CoreResult<usize> {
        Ok(self.find_raw(query).await?.len())
    }

    /// Runs an aggregation over the cached documents.
    pub async fn group(&self, aggregation: &Aggregation) -> CoreResult<Value> {
        if let Some(query) = &aggregation.query {
            query.validate()?;
        }
        let docs = self.storage.backend().find(&self.key).await?;
        Ok(aggregation.process(&docs))
    }

    /// Saves one document, generating an id if it has none.
    pub async fn save(&self, doc: T) -> CoreResult<T> {
        let mut saved = self.save_many(vec![doc]).await?;
        saved
            .pop()
            .ok_or_else(|| CoreError::data_integrity("backend returned no document"))
    }

    /// Saves documents, generating ids for those that have none.
    ///
    /// Documents that already have an id overwrite any prior record with the
    /// same id.
    pub async fn save_many(&self, docs: Vec<T>) -> CoreResult<Vec<T>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let values = Self::prepare(docs)?;

        let writer = self.storage.writer(&self.key);
        let _guard = writer.lock().await;
        self.write_values(values).await
    }

    /// Removes the documents matching `superseded`, then saves `docs`, as one
    /// write.
    ///
    /// No other write to this namespace runs between the removal and the
    /// save, so two concurrent replaces of the same document leave exactly
    /// one copy behind.
    ///
    /// # Errors
    ///
    /// Fails before removing anything if `superseded` is malformed or a
    /// document has an empty id.
    pub async fn replace(&self, superseded: &Query, docs: Vec<T>) -> CoreResult<Vec<T>> {
        superseded.validate()?;
        let values = Self::prepare(docs)?;

        let writer = self.storage.writer(&self.key);
        let _guard = writer.lock().await;
        self.remove_matching(superseded).await?;
        if values.is_empty() {
            return Ok(Vec::new());
        }
        self.write_values(values).await
    }

    /// Removes the document with the given id and returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Fails with a validation error if `id` is empty.
    pub async fn remove_by_id(&self, id: &str) -> CoreResult<usize> {
        if id.is_empty() {
            return Err(CoreError::validation("id must not be empty"));
        }
        let writer = self.storage.writer(&self.key);
        let _guard = writer.lock().await;
        Ok(self.storage.backend().remove_by_id(&self.key, id).await?)
    }

    /// Removes the documents matching `query`, or all documents.
    pub async fn remove(&self, query: Option<&Query>) -> CoreResult<usize> {
        let Some(query) = query else {
            return self.clear().await;
        };
        query.validate()?;

        let writer = self.storage.writer(&self.key);
        let _guard = writer.lock().await;
        self.remove_matching(query).await
    }

    /// Removes every document and returns how many were removed.
    pub async fn clear(&self) -> CoreResult<usize> {
        let writer = self.storage.writer(&self.key);
        let _guard = writer.lock().await;
        let removed = self.storage.backend().clear(&self.key).await?;
        debug!(namespace = %self.key, removed, "cache clear");
        Ok(removed)
    }

    fn prepare(docs: Vec<T>) -> CoreResult<Vec<Value>> {
        let mut values = Vec::with_capacity(docs.len());
        for mut doc in docs {
            match doc.id() {
                Some("") => return Err(CoreError::validation("_id must not be empty")),
                Some(_) => {}
                None => {
                    doc.set_id(generate_id());
                    doc.mark_generated_id();
                }
            }
            values.push(serde_json::to_value(&doc)?);
        }
        Ok(values)
    }

    // Callers hold the namespace writer.
    async fn write_values(&self, values: Vec<Value>) -> CoreResult<Vec<T>> {
        trace!(namespace = %self.key, count = values.len(), "cache save");
        let stored = self.storage.backend().save(&self.key, values).await?;
        stored
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(CoreError::from))
            .collect()
    }

    // Callers hold the namespace writer.
    async fn remove_matching(&self, query: &Query) -> CoreResult<usize> {
        let backend = self.storage.backend();
        let docs = query.process(backend.find(&self.key).await?);
        let mut removed = 0;
        for doc in &docs {
            let id = docsync_storage::document_id(doc)?;
            removed += backend.remove_by_id(&self.key, id).await?;
        }
        debug!(namespace = %self.key, removed, "cache remove");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_protocol::{Entity, Reducer};
    use serde_json::json;

    fn books() -> Cache<Entity> {
        LocalStorage::in_memory().cache(Namespace::new("books", None).unwrap())
    }

    fn book(id: &str, pages: u32) -> Entity {
        Entity::with_id(id).with_field("pages", json!(pages))
    }

    #[tokio::test]
    async fn save_without_id_generates_local_id() {
        let cache = books();
        let saved = cache.save(Entity::new().with_field("title", json!("Dune"))).await.unwrap();

        let id = saved.id().unwrap().to_owned();
        assert_eq!(id.len(), 24);
        assert!(saved.is_local());

        let stored = cache.find_by_id(&id).await.unwrap().unwrap();
        assert!(stored.is_local());
        assert_eq!(stored.get("title"), Some(&json!("Dune")));
    }

    #[tokio::test]
    async fn save_with_id_overwrites() {
        let cache = books();
        cache.save(book("b1", 100)).await.unwrap();
        let saved = cache.save(book("b1", 200)).await.unwrap();

        assert!(!saved.is_local());
        assert_eq!(cache.count(None).await.unwrap(), 1);
        assert_eq!(
            cache.find_by_id("b1").await.unwrap().unwrap().get("pages"),
            Some(&json!(200))
        );
    }

    #[tokio::test]
    async fn save_rejects_empty_id() {
        let err = books().save(Entity::with_id("")).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn find_and_count_with_query() {
        let cache = books();
        cache
            .save_many(vec![book("a", 10), book("b", 300), book("c", 500)])
            .await
            .unwrap();

        let query = Query::new().greater_than("pages", json!(100)).ascending("pages");
        let found = cache.find(Some(&query)).await.unwrap();
        let ids: Vec<_> = found.iter().map(|e| e.id().unwrap()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(cache.count(Some(&query)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn invalid_query_is_validation_error() {
        let query = Query::from_filter(json!({})).unwrap();
        assert!(books().find(Some(&query)).await.is_ok());

        let bad: Query =
            serde_json::from_value(json!({ "filter": { "pages": { "$near": 1 } } })).unwrap();
        let err = books().find(Some(&bad)).await.unwrap_err();
        assert!(err.is_validation());
        assert!(books().remove(Some(&bad)).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn remove_by_query_and_id() {
        let cache = books();
        cache
            .save_many(vec![book("a", 10), book("b", 300), book("c", 500)])
            .await
            .unwrap();

        let removed = cache
            .remove(Some(&Query::new().less_than("pages", json!(400))))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.remove_by_id("c").await.unwrap(), 1);
        assert_eq!(cache.remove_by_id("c").await.unwrap(), 0);
        assert!(cache.remove_by_id("").await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn clear_returns_count() {
        let cache = books();
        cache.save_many(vec![book("a", 1), book("b", 2)]).await.unwrap();
        assert_eq!(cache.clear().await.unwrap(), 2);
        assert_eq!(cache.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn group_delegates_to_aggregation() {
        let cache = books();
        cache
            .save_many(vec![book("a", 10), book("b", 30)])
            .await
            .unwrap();
        let result = cache
            .group(&Aggregation::new(Reducer::Sum("pages".into())))
            .await
            .unwrap();
        assert_eq!(result, json!([{ "sum": 40.0 }]));
    }

    #[tokio::test]
    async fn tags_isolate_datasets() {
        let storage = LocalStorage::in_memory();
        let alice = storage.cache::<Entity>(Namespace::new("books", Some("alice")).unwrap());
        let bob = storage.cache::<Entity>(Namespace::new("books", Some("bob")).unwrap());

        alice.save(book("a", 1)).await.unwrap();
        assert_eq!(alice.count(None).await.unwrap(), 1);
        assert_eq!(bob.count(None).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_are_not_lost() {
        let cache = books();
        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.save(book(&format!("b{i}"), i)).await })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }
        assert_eq!(cache.count(None).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn replace_swaps_matching_documents() {
        let cache = books();
        cache.save_many(vec![book("a", 10), book("b", 20)]).await.unwrap();

        let superseded = Query::new().equal_to("_id", json!("a"));
        let saved = cache.replace(&superseded, vec![book("c", 30)]).await.unwrap();

        assert_eq!(saved.len(), 1);
        assert!(cache.find_by_id("a").await.unwrap().is_none());
        assert_eq!(cache.count(None).await.unwrap(), 2);

        let drop_b = Query::new().equal_to("_id", json!("b"));
        assert!(cache.replace(&drop_b, Vec::new()).await.unwrap().is_empty());
        assert_eq!(cache.count(None).await.unwrap(), 1);
    }
}
