//! Entry point that wires storage, gateway and configuration into stores.

use crate::config::{StoreOptions, SyncConfig};
use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::gateway::RemoteGateway;
use crate::guard::PushGuard;
use crate::store::{CacheStore, DataStore, DataStoreType, NetworkStore, SyncStore};
use docsync_core::{LocalStorage, Namespace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Shared state behind every data store of one application.
///
/// Stores created for the same collection and tag share one [`SyncEngine`],
/// so they see the same push exclusion and statistics.
#[derive(Clone)]
pub struct Client {
    storage: LocalStorage,
    gateway: Arc<dyn RemoteGateway>,
    guard: PushGuard,
    config: SyncConfig,
    engines: Arc<Mutex<HashMap<String, Arc<SyncEngine>>>>,
}

impl Client {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `config` is invalid.
    pub fn new(
        storage: LocalStorage,
        gateway: Arc<dyn RemoteGateway>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            storage,
            gateway,
            guard: PushGuard::new(),
            config,
            engines: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Returns the local storage.
    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Returns the gateway.
    pub fn gateway(&self) -> &Arc<dyn RemoteGateway> {
        &self.gateway
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the push exclusion registry shared by every engine.
    pub fn push_guard(&self) -> &PushGuard {
        &self.guard
    }

    /// Returns the engine of `collection` under the effective tag.
    pub fn engine(&self, collection: &str, options: &StoreOptions) -> SyncResult<Arc<SyncEngine>> {
        let namespace = Namespace::new(collection, options.tag(&self.config))?;
        let key = namespace.key();
        let mut engines = self.engines.lock();
        if let Some(engine) = engines.get(&key) {
            return Ok(Arc::clone(engine));
        }
        let engine = Arc::new(
            SyncEngine::new(
                &self.storage,
                namespace,
                Arc::clone(&self.gateway),
                self.guard.clone(),
            )?
            .with_batch_size(self.config.push_batch_size),
        );
        debug!(namespace = %key, "created sync engine");
        engines.insert(key, Arc::clone(&engine));
        Ok(engine)
    }

    /// Returns a store that talks to the server only.
    pub fn network_store(&self, collection: &str) -> SyncResult<NetworkStore> {
        Namespace::new(collection, None)?;
        Ok(NetworkStore::new(collection, Arc::clone(&self.gateway)))
    }

    /// Returns a store that works locally until explicitly synced.
    pub fn sync_store(&self, collection: &str, options: StoreOptions) -> SyncResult<SyncStore> {
        let engine = self.engine(collection, &options)?;
        Ok(SyncStore::new(engine, options.pull_options(&self.config)))
    }

    /// Returns a store that keeps its cache in step with the server.
    pub fn cache_store(&self, collection: &str, options: StoreOptions) -> SyncResult<CacheStore> {
        let engine = self.engine(collection, &options)?;
        Ok(CacheStore::new(engine, options.pull_options(&self.config)))
    }

    /// Returns a store of the requested access mode.
    ///
    /// `options` is ignored for [`DataStoreType::Network`].
    pub fn collection(
        &self,
        collection: &str,
        store_type: DataStoreType,
        options: StoreOptions,
    ) -> SyncResult<Box<dyn DataStore>> {
        Ok(match store_type {
            DataStoreType::Network => Box::new(self.network_store(collection)?),
            DataStoreType::Sync => Box::new(self.sync_store(collection, options)?),
            DataStoreType::Cache => Box::new(self.cache_store(collection, options)?),
        })
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::store::OfflineDataStore;
    use docsync_protocol::Entity;

    fn client(config: SyncConfig) -> Client {
        Client::new(
            LocalStorage::in_memory(),
            Arc::new(MockGateway::new()),
            config,
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let err = Client::new(
            LocalStorage::in_memory(),
            Arc::new(MockGateway::new()),
            SyncConfig::new().with_push_batch_size(0),
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn engines_are_shared_per_namespace() {
        let client = client(SyncConfig::new());
        let a = client.engine("books", &StoreOptions::new()).unwrap();
        let b = client.engine("books", &StoreOptions::new()).unwrap();
        let tagged = client
            .engine("books", &StoreOptions::new().with_tag("t1"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &tagged));
    }

    #[test]
    fn invalid_tag_is_rejected() {
        let client = client(SyncConfig::new());
        let err = client
            .sync_store("books", StoreOptions::new().with_tag("bad tag!"))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn store_options_override_config() {
        let client = client(SyncConfig::new().with_delta_set(true).with_page_size(50));
        let store = client
            .sync_store(
                "books",
                StoreOptions::new()
                    .with_delta_set(false)
                    .with_auto_pagination(true),
            )
            .unwrap();
        assert!(!store.pull_options().use_delta_set);
        assert_eq!(store.pull_options().auto_pagination, Some(50));
    }

    #[tokio::test]
    async fn collection_dispatches_on_store_type() {
        let client = client(SyncConfig::new());
        for store_type in [DataStoreType::Network, DataStoreType::Sync, DataStoreType::Cache] {
            let store = client
                .collection("books", store_type, StoreOptions::new())
                .unwrap();
            assert_eq!(store.store_type(), store_type);
            assert_eq!(store.as_offline().is_some(), store_type != DataStoreType::Network);
        }
    }

    #[tokio::test]
    async fn tags_isolate_local_data() {
        let client = client(SyncConfig::new());
        let a = client
            .sync_store("books", StoreOptions::new().with_tag("a"))
            .unwrap();
        let b = client
            .sync_store("books", StoreOptions::new().with_tag("b"))
            .unwrap();

        a.create(Entity::new()).await.unwrap();
        assert_eq!(a.count(None).await.unwrap(), 1);
        assert_eq!(b.count(None).await.unwrap(), 0);
        assert_eq!(b.pending_sync_count(None).await.unwrap(), 0);
    }
}
