//! Cache-with-autosync access mode.

use super::local::SyncStore;
use super::{ids_query, DataStore, DataStoreType, OfflineDataStore};
use crate::config::PullOptions;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use docsync_protocol::{Aggregation, Entity, PushResult, Query, SyncOperation, SyncQueueEntry};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// A store that keeps the local cache in step with the server.
///
/// Reads refresh from the server first and serve cached data when the
/// server cannot be reached. Writes land in the cache and are pushed
/// before returning; a failed push is reported but the local write stays.
#[derive(Debug, Clone)]
pub struct CacheStore {
    local: SyncStore,
}

impl CacheStore {
    /// Creates a store over `engine`.
    pub fn new(engine: Arc<SyncEngine>, pull_options: PullOptions) -> Self {
        Self {
            local: SyncStore::new(engine, pull_options),
        }
    }

    /// Returns the sync engine.
    pub fn engine(&self) -> &SyncEngine {
        self.local.engine()
    }

    /// Pushes what is pending for `query`, then pulls it.
    ///
    /// Paging is dropped from both steps so the local window over the cache
    /// sees the same documents the server would have windowed.
    async fn refresh(&self, query: Option<&Query>) -> SyncResult<()> {
        let scope = query.map(Query::without_paging);
        let results = self.engine().push(scope.as_ref()).await?;
        first_failure(&results)?;
        self.engine()
            .pull(scope.as_ref(), self.local.pull_options())
            .await?;
        Ok(())
    }

    /// Runs `refresh` and swallows connectivity failures.
    async fn refresh_or_offline(&self, query: Option<&Query>) -> SyncResult<()> {
        match self.refresh(query).await {
            Err(err) if err.is_connectivity() => {
                warn!(collection = self.collection(), error = %err, "offline, serving cached data");
                Ok(())
            }
            other => other,
        }
    }

    /// Pushes the pending entries of the given entities.
    async fn push_ids(&self, ids: &[&str]) -> SyncResult<Vec<PushResult>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let results = self
            .engine()
            .push(Some(&ids_query(ids.iter().copied())))
            .await?;
        first_failure(&results)?;
        Ok(results)
    }

    async fn write(&self, entity: Entity, operation: SyncOperation) -> SyncResult<Entity> {
        let saved = self.local.save_and_queue(entity, operation).await?;
        let Some(id) = saved.id() else {
            return Ok(saved);
        };
        let results = self.push_ids(&[id]).await?;
        let server = results.into_iter().find_map(|result| result.entity);
        Ok(server.unwrap_or(saved))
    }

    async fn delete(&self, entities: Vec<Entity>) -> SyncResult<usize> {
        let (local, synced): (Vec<Entity>, Vec<Entity>) =
            entities.into_iter().partition(Entity::is_local);

        let engine = self.engine();
        let mut removed = 0;
        for entity in &local {
            if let Some(id) = entity.id() {
                removed += engine.cache().remove_by_id(id).await?;
                engine.queue().remove_for_entity(self.collection(), id).await?;
            }
        }
        if !local.is_empty() {
            debug!(purged = local.len(), "purged entities never sent to the server");
        }

        removed += self.local.remove_and_queue(&synced).await?;
        let ids: Vec<&str> = synced.iter().filter_map(Entity::id).collect();
        self.push_ids(&ids).await?;
        Ok(removed)
    }
}

/// Surfaces the first failed entry of a push.
fn first_failure(results: &[PushResult]) -> SyncResult<()> {
    match results.iter().find_map(|result| result.error.as_ref()) {
        Some(err) => Err(SyncError::Push(err.clone())),
        None => Ok(()),
    }
}

#[async_trait]
impl DataStore for CacheStore {
    fn collection(&self) -> &str {
        self.local.collection()
    }

    fn store_type(&self) -> DataStoreType {
        DataStoreType::Cache
    }

    fn as_offline(&self) -> Option<&dyn OfflineDataStore> {
        Some(self)
    }

    async fn find(&self, query: Option<&Query>) -> SyncResult<Vec<Entity>> {
        self.refresh_or_offline(query).await?;
        self.local.find(query).await
    }

    async fn find_by_id(&self, id: &str) -> SyncResult<Option<Entity>> {
        if id.is_empty() {
            return Ok(None);
        }
        let engine = self.engine();
        let fetched = match self.push_ids(&[id]).await {
            Ok(_) => engine.gateway().find_by_id(self.collection(), id).await,
            Err(err) if err.is_connectivity() => {
                warn!(collection = self.collection(), error = %err, "offline, serving cached data");
                return self.local.find_by_id(id).await;
            }
            Err(err) => return Err(err),
        };
        match fetched {
            Ok(entity) => Ok(Some(engine.cache().save(entity).await?)),
            Err(err) if err.is_not_found() => {
                engine.cache().remove_by_id(id).await?;
                Ok(None)
            }
            Err(err) if err.is_connectivity() => {
                warn!(collection = self.collection(), error = %err, "offline, serving cached data");
                self.local.find_by_id(id).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn count(&self, query: Option<&Query>) -> SyncResult<usize> {
        if let Some(query) = query {
            query.validate()?;
        }
        let engine = self.engine();
        let pushed = engine.push(query).await.and_then(|r| first_failure(&r));
        let counted = match pushed {
            Ok(()) => engine
                .gateway()
                .count(self.collection(), query)
                .await
                .map(|response| response.count)
                .map_err(SyncError::from),
            Err(err) => Err(err),
        };
        match counted {
            Ok(count) => Ok(count),
            Err(err) if err.is_connectivity() => {
                warn!(collection = self.collection(), error = %err, "offline, counting cached data");
                self.local.count(query).await
            }
            Err(err) => Err(err),
        }
    }

    async fn group(&self, aggregation: &Aggregation) -> SyncResult<Value> {
        self.refresh_or_offline(aggregation.query.as_ref()).await?;
        self.local.group(aggregation).await
    }

    async fn create(&self, entity: Entity) -> SyncResult<Entity> {
        self.write(entity, SyncOperation::Create).await
    }

    async fn update(&self, entity: Entity) -> SyncResult<Entity> {
        if entity.id().map_or(true, str::is_empty) {
            return Err(SyncError::validation("an entity needs an _id to be updated"));
        }
        self.write(entity, SyncOperation::Update).await
    }

    async fn remove(&self, query: Option<&Query>) -> SyncResult<usize> {
        let entities = self.engine().cache().find(query).await?;
        self.delete(entities).await
    }

    async fn remove_by_id(&self, id: &str) -> SyncResult<usize> {
        if id.is_empty() {
            return Err(SyncError::validation("id must not be empty"));
        }
        match self.engine().cache().find_by_id(id).await? {
            Some(entity) => self.delete(vec![entity]).await,
            None => Ok(0),
        }
    }
}

#[async_trait]
impl OfflineDataStore for CacheStore {
    async fn push(&self, query: Option<&Query>) -> SyncResult<Vec<PushResult>> {
        self.local.push(query).await
    }

    async fn pull(&self, query: Option<&Query>, options: Option<&PullOptions>) -> SyncResult<usize> {
        self.local.pull(query, options).await
    }

    async fn pending_sync_count(&self, query: Option<&Query>) -> SyncResult<usize> {
        self.local.pending_sync_count(query).await
    }

    async fn pending_sync_entities(
        &self,
        query: Option<&Query>,
    ) -> SyncResult<Vec<SyncQueueEntry>> {
        self.local.pending_sync_entities(query).await
    }

    async fn clear_sync(&self, query: Option<&Query>) -> SyncResult<usize> {
        self.local.clear_sync(query).await
    }

    async fn clear(&self, query: Option<&Query>) -> SyncResult<usize> {
        self.local.clear(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{method, MockGateway};
    use crate::guard::PushGuard;
    use docsync_core::{LocalStorage, Namespace};
    use docsync_protocol::{GatewayError, GatewayErrorKind, PushErrorKind};
    use serde_json::json;

    fn store() -> (Arc<MockGateway>, CacheStore) {
        store_with(PullOptions::new())
    }

    fn store_with(options: PullOptions) -> (Arc<MockGateway>, CacheStore) {
        let gateway = Arc::new(MockGateway::new());
        let engine = SyncEngine::new(
            &LocalStorage::in_memory(),
            Namespace::new("books", None).unwrap(),
            gateway.clone(),
            PushGuard::new(),
        )
        .unwrap();
        (gateway, CacheStore::new(Arc::new(engine), options))
    }

    #[tokio::test]
    async fn create_is_pushed_before_returning() {
        let (gateway, store) = store();
        let created = store
            .create(Entity::new().with_field("title", json!("Dune")))
            .await
            .unwrap();

        assert!(!created.is_local());
        let id = created.id().unwrap();
        assert!(gateway.entity("books", id).is_some());
        assert_eq!(store.pending_sync_count(None).await.unwrap(), 0);
        let cached = store.engine().cache().find(None).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id(), Some(id));
    }

    #[tokio::test]
    async fn failed_push_surfaces_but_keeps_local_write() {
        let (gateway, store) = store();
        gateway.set_offline(true);

        let err = store.create(Entity::new()).await.unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(store.engine().cache().count(None).await.unwrap(), 1);
        assert_eq!(store.pending_sync_count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_refreshes_from_server() {
        let (gateway, store) = store();
        gateway.insert("books", vec![Entity::with_id("a"), Entity::with_id("b")]);

        let found = store.find(None).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(gateway.calls(method::FIND), 1);
        assert_eq!(store.engine().cache().count(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn find_serves_cache_when_offline() {
        let (gateway, store) = store();
        gateway.insert("books", vec![Entity::with_id("a")]);
        store.find(None).await.unwrap();

        gateway.set_offline(true);
        let found = store.find(None).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn find_propagates_other_errors() {
        let (gateway, store) = store();
        gateway.fail_next(
            method::FIND,
            GatewayError::new(GatewayErrorKind::Unauthorized, "expired"),
        );
        let err = store.find(None).await.unwrap_err();
        assert!(matches!(err, SyncError::Gateway(_)));
    }

    #[tokio::test]
    async fn find_pushes_pending_before_pulling() {
        let (gateway, store) = store();
        gateway.set_offline(true);
        let _ = store.create(Entity::new()).await;
        gateway.set_offline(false);

        let found = store.find(None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(!found[0].is_local());
        assert_eq!(store.pending_sync_count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn windowed_find_is_applied_locally() {
        let (gateway, store) = store();
        let entities = (0..5)
            .map(|i| Entity::with_id(format!("e{i}")).with_field("n", json!(i)))
            .collect();
        gateway.insert("books", entities);

        let query = Query::new().ascending("n").skip(1).limit(2);
        let found = store.find(Some(&query)).await.unwrap();
        let ns: Vec<_> = found.iter().map(|e| e.get("n").cloned()).collect();
        assert_eq!(ns, vec![Some(json!(1)), Some(json!(2))]);
    }

    #[tokio::test]
    async fn windowed_find_pushes_every_pending_entry() {
        let (gateway, store) = store();
        gateway.set_offline(true);
        for i in 0..3 {
            let _ = store.create(Entity::new().with_field("n", json!(i))).await;
        }
        gateway.set_offline(false);

        let found = store
            .find(Some(&Query::new().ascending("n").limit(1)))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("n"), Some(&json!(0)));
        assert_eq!(store.pending_sync_count(None).await.unwrap(), 0);
        assert_eq!(gateway.entities("books").len(), 3);
    }

    #[tokio::test]
    async fn paginated_find_keeps_cache_when_offline() {
        let (gateway, store) = store_with(PullOptions::new().with_auto_pagination(2));
        gateway.insert("books", (0..3).map(|i| Entity::with_id(format!("e{i}"))).collect());
        assert_eq!(store.find(None).await.unwrap().len(), 3);

        gateway.set_offline(true);
        assert_eq!(store.find(None).await.unwrap().len(), 3);
        assert_eq!(store.engine().cache().count(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn find_by_id_tracks_server_state() {
        let (gateway, store) = store();
        gateway.insert("books", vec![Entity::with_id("a")]);
        assert!(store.find_by_id("a").await.unwrap().is_some());
        assert!(store.engine().cache().find_by_id("a").await.unwrap().is_some());

        gateway.delete("books", "a");
        assert!(store.find_by_id("a").await.unwrap().is_none());
        assert!(store.engine().cache().find_by_id("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_id_offline_uses_cache() {
        let (gateway, store) = store();
        gateway.insert("books", vec![Entity::with_id("a")]);
        store.find_by_id("a").await.unwrap();

        gateway.set_offline(true);
        assert!(store.find_by_id("a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn count_falls_back_offline() {
        let (gateway, store) = store();
        gateway.insert("books", vec![Entity::with_id("a"), Entity::with_id("b")]);
        assert_eq!(store.count(None).await.unwrap(), 2);
        assert_eq!(store.engine().cache().count(None).await.unwrap(), 0);

        store.find(None).await.unwrap();
        gateway.set_offline(true);
        assert_eq!(store.count(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn removing_local_entity_never_reaches_server() {
        let (gateway, store) = store();
        gateway.set_offline(true);
        let _ = store.create(Entity::new()).await;
        let local = store.engine().cache().find(None).await.unwrap().remove(0);
        gateway.set_offline(false);
        let attempted_creates = gateway.calls(method::CREATE);

        assert_eq!(store.remove_by_id(local.id().unwrap()).await.unwrap(), 1);
        assert_eq!(store.pending_sync_count(None).await.unwrap(), 0);
        assert_eq!(gateway.calls(method::REMOVE_BY_ID), 0);
        assert_eq!(gateway.calls(method::CREATE), attempted_creates);
    }

    #[tokio::test]
    async fn removing_synced_entity_is_pushed() {
        let (gateway, store) = store();
        let created = store.create(Entity::new()).await.unwrap();

        assert_eq!(store.remove(None).await.unwrap(), 1);
        assert_eq!(gateway.calls(method::REMOVE_BY_ID), 1);
        assert!(gateway.entity("books", created.id().unwrap()).is_none());
        assert_eq!(store.pending_sync_count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_delete_push_is_reported() {
        let (gateway, store) = store();
        let created = store.create(Entity::new()).await.unwrap();
        gateway.fail_next(method::REMOVE_BY_ID, GatewayError::server("boom"));

        let err = store.remove_by_id(created.id().unwrap()).await.unwrap_err();
        match err {
            SyncError::Push(push) => {
                assert_eq!(push.kind, PushErrorKind::Gateway(GatewayErrorKind::Server))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.engine().cache().count(None).await.unwrap(), 0);
        assert_eq!(store.pending_sync_count(None).await.unwrap(), 1);
    }
}
