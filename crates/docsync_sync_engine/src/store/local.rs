//! Sync-only (local) access mode.

use super::{ids_query, DataStore, DataStoreType, OfflineDataStore};
use crate::config::PullOptions;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use docsync_core::Cache;
use docsync_protocol::{Aggregation, Entity, PushResult, Query, SyncOperation, SyncQueueEntry};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A store that reads and writes the local cache only.
///
/// Every write records a sync operation; `push` and `pull` are explicit.
#[derive(Debug, Clone)]
pub struct SyncStore {
    engine: Arc<SyncEngine>,
    pull_options: PullOptions,
}

impl SyncStore {
    /// Creates a store over `engine`.
    pub fn new(engine: Arc<SyncEngine>, pull_options: PullOptions) -> Self {
        Self {
            engine,
            pull_options,
        }
    }

    /// Returns the sync engine.
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Returns the pull options used when a pull passes none.
    pub fn pull_options(&self) -> &PullOptions {
        &self.pull_options
    }

    fn cache(&self) -> &Cache<Entity> {
        self.engine.cache()
    }

    /// Writes to the cache and records `operation` for the saved entity.
    pub(crate) async fn save_and_queue(
        &self,
        entity: Entity,
        operation: SyncOperation,
    ) -> SyncResult<Entity> {
        let saved = self.cache().save(entity).await?;
        self.engine
            .queue()
            .add_sync_event(self.collection(), operation, std::slice::from_ref(&saved))
            .await?;
        Ok(saved)
    }

    /// Removes entities from the cache and records deletes for them.
    ///
    /// Local entities get no delete entry; their pending create is dropped.
    pub(crate) async fn remove_and_queue(&self, entities: &[Entity]) -> SyncResult<usize> {
        let mut removed = 0;
        for entity in entities {
            if let Some(id) = entity.id() {
                removed += self.cache().remove_by_id(id).await?;
            }
        }
        self.engine
            .queue()
            .add_sync_event(self.collection(), SyncOperation::Delete, entities)
            .await?;
        debug!(collection = self.collection(), removed, "removed locally");
        Ok(removed)
    }
}

#[async_trait]
impl DataStore for SyncStore {
    fn collection(&self) -> &str {
        self.engine.collection()
    }

    fn store_type(&self) -> DataStoreType {
        DataStoreType::Sync
    }

    fn as_offline(&self) -> Option<&dyn OfflineDataStore> {
        Some(self)
    }

    async fn find(&self, query: Option<&Query>) -> SyncResult<Vec<Entity>> {
        Ok(self.cache().find(query).await?)
    }

    async fn find_by_id(&self, id: &str) -> SyncResult<Option<Entity>> {
        Ok(self.cache().find_by_id(id).await?)
    }

    async fn count(&self, query: Option<&Query>) -> SyncResult<usize> {
        Ok(self.cache().count(query).await?)
    }

    async fn group(&self, aggregation: &Aggregation) -> SyncResult<Value> {
        Ok(self.cache().group(aggregation).await?)
    }

    async fn create(&self, entity: Entity) -> SyncResult<Entity> {
        self.save_and_queue(entity, SyncOperation::Create).await
    }

    async fn update(&self, entity: Entity) -> SyncResult<Entity> {
        if entity.id().map_or(true, str::is_empty) {
            return Err(SyncError::validation("an entity needs an _id to be updated"));
        }
        self.save_and_queue(entity, SyncOperation::Update).await
    }

    async fn remove(&self, query: Option<&Query>) -> SyncResult<usize> {
        let entities = self.cache().find(query).await?;
        self.remove_and_queue(&entities).await
    }

    async fn remove_by_id(&self, id: &str) -> SyncResult<usize> {
        if id.is_empty() {
            return Err(SyncError::validation("id must not be empty"));
        }
        match self.cache().find_by_id(id).await? {
            Some(entity) => self.remove_and_queue(&[entity]).await,
            None => Ok(0),
        }
    }
}

#[async_trait]
impl OfflineDataStore for SyncStore {
    async fn push(&self, query: Option<&Query>) -> SyncResult<Vec<PushResult>> {
        self.engine.push(query).await
    }

    async fn pull(&self, query: Option<&Query>, options: Option<&PullOptions>) -> SyncResult<usize> {
        self.engine
            .pull(query, options.unwrap_or(&self.pull_options))
            .await
    }

    async fn pending_sync_count(&self, query: Option<&Query>) -> SyncResult<usize> {
        self.engine.pending_count(query).await
    }

    async fn pending_sync_entities(
        &self,
        query: Option<&Query>,
    ) -> SyncResult<Vec<SyncQueueEntry>> {
        self.engine.pending_entries(query).await
    }

    async fn clear_sync(&self, query: Option<&Query>) -> SyncResult<usize> {
        self.engine.clear_sync(query).await
    }

    async fn clear(&self, query: Option<&Query>) -> SyncResult<usize> {
        let entities = self.cache().find(query).await?;
        let ids: Vec<&str> = entities.iter().filter_map(Entity::id).collect();
        if !ids.is_empty() {
            self.engine.clear_sync(Some(&ids_query(ids.iter().copied()))).await?;
        }
        let removed = self.cache().remove(query).await?;
        if query.is_none() {
            self.engine
                .query_cache()
                .clear_collection(self.collection())
                .await?;
        }
        Ok(removed)
    }
}
