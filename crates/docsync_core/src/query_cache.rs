//! Bookkeeping for incremental (delta-set) fetches.

use crate::cache::Cache;
use crate::error::CoreResult;
use crate::namespace::Namespace;
use crate::storage::LocalStorage;
use docsync_protocol::{Query, QueryCacheEntry};
use serde_json::json;

/// Maps each unbounded query of a collection to the server time of its last
/// successful fetch.
///
/// Queries with a skip or a limit describe a window, not a whole result set,
/// and are never recorded.
#[derive(Debug, Clone)]
pub struct QueryCache {
    entries: Cache<QueryCacheEntry>,
}

impl QueryCache {
    /// Opens the query cache for `tag`.
    pub fn new(storage: &LocalStorage, tag: Option<&str>) -> CoreResult<Self> {
        Ok(Self {
            entries: storage.cache(Namespace::query_cache(tag)?),
        })
    }

    /// Returns the underlying entry cache.
    pub fn entries(&self) -> &Cache<QueryCacheEntry> {
        &self.entries
    }

    /// Looks up the entry of `query` against `collection`.
    pub async fn find_entry(
        &self,
        collection: &str,
        query: &Query,
    ) -> CoreResult<Option<QueryCacheEntry>> {
        let lookup = Query::new()
            .equal_to("collection", json!(collection))
            .equal_to("query", json!(query.key()))
            .limit(1);
        Ok(self.entries.find(Some(&lookup)).await?.pop())
    }

    /// Records a successful fetch of `query`.
    ///
    /// Returns `None` without writing when the query is windowed.
    pub async fn record(
        &self,
        collection: &str,
        query: &Query,
        last_request: Option<String>,
    ) -> CoreResult<Option<QueryCacheEntry>> {
        if !query.is_unbounded() {
            return Ok(None);
        }
        let mut entry = match self.find_entry(collection, query).await? {
            Some(entry) => entry,
            None => QueryCacheEntry::new(collection, query.key()),
        };
        entry.last_request = last_request;
        Ok(Some(self.entries.save(entry).await?))
    }

    /// Removes every entry of `collection`.
    pub async fn clear_collection(&self, collection: &str) -> CoreResult<usize> {
        let scope = Query::new().equal_to("collection", json!(collection));
        self.entries.remove(Some(&scope)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> QueryCache {
        QueryCache::new(&LocalStorage::in_memory(), None).unwrap()
    }

    #[tokio::test]
    async fn record_then_update_reuses_entry() {
        let qc = cache();
        let query = Query::new().equal_to("genre", json!("sf"));

        let first = qc.record("books", &query, Some("t0".into())).await.unwrap().unwrap();
        let second = qc.record("books", &query, Some("t1".into())).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(qc.entries().count(None).await.unwrap(), 1);
        let found = qc.find_entry("books", &query).await.unwrap().unwrap();
        assert_eq!(found.last_request.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn windowed_queries_are_not_recorded() {
        let qc = cache();
        assert!(qc
            .record("books", &Query::new().limit(10), Some("t0".into()))
            .await
            .unwrap()
            .is_none());
        assert!(qc
            .record("books", &Query::new().skip(5), Some("t0".into()))
            .await
            .unwrap()
            .is_none());
        assert_eq!(qc.entries().count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn entries_are_scoped_by_collection() {
        let qc = cache();
        let all = Query::new();
        qc.record("books", &all, Some("t0".into())).await.unwrap();
        qc.record("films", &all, Some("t1".into())).await.unwrap();

        assert_eq!(
            qc.find_entry("films", &all).await.unwrap().unwrap().last_request.as_deref(),
            Some("t1")
        );
        assert_eq!(qc.clear_collection("books").await.unwrap(), 1);
        assert!(qc.find_entry("books", &all).await.unwrap().is_none());
        assert!(qc.find_entry("films", &all).await.unwrap().is_some());
    }
}
