//! Network-only access mode.

use super::{DataStore, DataStoreType};
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use async_trait::async_trait;
use docsync_protocol::{Aggregation, Entity, Query};
use serde_json::Value;
use std::sync::Arc;

/// A store that bypasses local storage entirely.
///
/// Nothing is cached and no sync bookkeeping is produced.
#[derive(Clone)]
pub struct NetworkStore {
    collection: String,
    gateway: Arc<dyn RemoteGateway>,
}

impl NetworkStore {
    /// Creates a network store for `collection`.
    pub fn new(collection: impl Into<String>, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self {
            collection: collection.into(),
            gateway,
        }
    }
}

impl std::fmt::Debug for NetworkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkStore")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DataStore for NetworkStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn store_type(&self) -> DataStoreType {
        DataStoreType::Network
    }

    async fn find(&self, query: Option<&Query>) -> SyncResult<Vec<Entity>> {
        if let Some(query) = query {
            query.validate()?;
        }
        Ok(self.gateway.find(&self.collection, query).await?.entities)
    }

    async fn find_by_id(&self, id: &str) -> SyncResult<Option<Entity>> {
        if id.is_empty() {
            return Ok(None);
        }
        match self.gateway.find_by_id(&self.collection, id).await {
            Ok(entity) => Ok(Some(entity)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn count(&self, query: Option<&Query>) -> SyncResult<usize> {
        if let Some(query) = query {
            query.validate()?;
        }
        Ok(self.gateway.count(&self.collection, query).await?.count)
    }

    async fn group(&self, aggregation: &Aggregation) -> SyncResult<Value> {
        if let Some(query) = &aggregation.query {
            query.validate()?;
        }
        let response = self
            .gateway
            .find(&self.collection, aggregation.query.as_ref())
            .await?;
        let docs = response
            .entities
            .iter()
            .map(Entity::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(aggregation.process(&docs))
    }

    async fn create(&self, entity: Entity) -> SyncResult<Entity> {
        Ok(self.gateway.create(&self.collection, entity).await?)
    }

    async fn update(&self, entity: Entity) -> SyncResult<Entity> {
        if entity.id().map_or(true, str::is_empty) {
            return Err(SyncError::validation("an entity needs an _id to be updated"));
        }
        Ok(self.gateway.update(&self.collection, entity).await?)
    }

    async fn remove(&self, query: Option<&Query>) -> SyncResult<usize> {
        if let Some(query) = query {
            query.validate()?;
        }
        Ok(self.gateway.remove(&self.collection, query).await?)
    }

    async fn remove_by_id(&self, id: &str) -> SyncResult<usize> {
        if id.is_empty() {
            return Err(SyncError::validation("id must not be empty"));
        }
        Ok(self.gateway.remove_by_id(&self.collection, id).await?)
    }
}
