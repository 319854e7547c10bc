//! Data stores: the three access modes consumers read and write through.
//!
//! - [`NetworkStore`] talks to the gateway only
//! - [`SyncStore`] touches only the local cache and the sync queue; push and
//!   pull are explicit
//! - [`CacheStore`] refreshes from the network before reads and pushes each
//!   write immediately, serving cached data when the network is unreachable

mod auto;
mod local;
mod network;

pub use auto::CacheStore;
pub use local::SyncStore;
pub use network::NetworkStore;

use crate::config::PullOptions;
use crate::error::SyncResult;
use async_trait::async_trait;
use docsync_protocol::{Aggregation, Entity, PushResult, Query, SyncQueueEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Access mode of a data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataStoreType {
    /// Every operation goes to the server.
    Network,
    /// Every operation stays local until pushed or pulled.
    Sync,
    /// Local cache kept in step with the server automatically.
    #[default]
    Cache,
}

/// Combined outcome of [`OfflineDataStore::sync`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    /// Per-entity push results.
    pub push: Vec<PushResult>,
    /// Number of documents pulled.
    pub pull: usize,
}

/// Operations every access mode supports.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Returns the collection name.
    fn collection(&self) -> &str;

    /// Returns the access mode.
    fn store_type(&self) -> DataStoreType;

    /// Returns the offline operations, for modes that keep local data.
    fn as_offline(&self) -> Option<&dyn OfflineDataStore> {
        None
    }

    /// Returns the entities matching `query`, or all entities.
    async fn find(&self, query: Option<&Query>) -> SyncResult<Vec<Entity>>;

    /// Returns one entity, or `None` if it does not exist.
    async fn find_by_id(&self, id: &str) -> SyncResult<Option<Entity>>;

    /// Counts the entities matching `query`, or all entities.
    async fn count(&self, query: Option<&Query>) -> SyncResult<usize>;

    /// Runs an aggregation.
    async fn group(&self, aggregation: &Aggregation) -> SyncResult<Value>;

    /// Creates an entity.
    async fn create(&self, entity: Entity) -> SyncResult<Entity>;

    /// Replaces an entity by its `_id`.
    async fn update(&self, entity: Entity) -> SyncResult<Entity>;

    /// Creates the entity if it has no `_id`, otherwise updates it.
    async fn save(&self, entity: Entity) -> SyncResult<Entity> {
        if entity.id().is_some() {
            self.update(entity).await
        } else {
            self.create(entity).await
        }
    }

    /// Removes the entities matching `query`, or all entities.
    async fn remove(&self, query: Option<&Query>) -> SyncResult<usize>;

    /// Removes one entity.
    async fn remove_by_id(&self, id: &str) -> SyncResult<usize>;
}

/// Operations of the modes that keep a local copy.
#[async_trait]
pub trait OfflineDataStore: DataStore {
    /// Pushes the queued operations whose entity matches `query`.
    async fn push(&self, query: Option<&Query>) -> SyncResult<Vec<PushResult>>;

    /// Pulls entities matching `query` into the local cache.
    ///
    /// `options` defaults to the store's configured pull options.
    async fn pull(&self, query: Option<&Query>, options: Option<&PullOptions>) -> SyncResult<usize>;

    /// Pushes, then pulls.
    async fn sync(
        &self,
        query: Option<&Query>,
        options: Option<&PullOptions>,
    ) -> SyncResult<SyncOutcome> {
        let push = self.push(query).await?;
        let pull = self.pull(query, options).await?;
        Ok(SyncOutcome { push, pull })
    }

    /// Counts the queued operations whose entity matches `query`.
    async fn pending_sync_count(&self, query: Option<&Query>) -> SyncResult<usize>;

    /// Returns the queued operations whose entity matches `query`.
    async fn pending_sync_entities(&self, query: Option<&Query>)
        -> SyncResult<Vec<SyncQueueEntry>>;

    /// Drops queued operations without pushing them.
    async fn clear_sync(&self, query: Option<&Query>) -> SyncResult<usize>;

    /// Removes cached entities matching `query` together with their queued
    /// operations, and with no query also the collection's delta-set
    /// bookkeeping. Nothing is sent to the server.
    async fn clear(&self, query: Option<&Query>) -> SyncResult<usize>;
}

/// Builds the query selecting the given entity ids.
pub(crate) fn ids_query<'a>(ids: impl IntoIterator<Item = &'a str>) -> Query {
    Query::new().contained_in(
        docsync_protocol::ID_FIELD,
        ids.into_iter().map(|id| Value::String(id.to_owned())).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_type_default_and_serde() {
        assert_eq!(DataStoreType::default(), DataStoreType::Cache);
        let parsed: DataStoreType = serde_json::from_str("\"network\"").unwrap();
        assert_eq!(parsed, DataStoreType::Network);
    }

    #[test]
    fn ids_query_matches_listed_ids() {
        let query = ids_query(["a", "b"]);
        assert!(query.matches(&serde_json::json!({ "_id": "a" })));
        assert!(!query.matches(&serde_json::json!({ "_id": "c" })));
    }
}
