//! Test fixtures and client helpers.
//!
//! Provides convenience functions for setting up clients backed by an
//! in-memory server and common sync scenarios.

use docsync_core::LocalStorage;
use docsync_protocol::Entity;
use docsync_storage::FileStore;
use docsync_sync_engine::{Client, MockGateway, StoreOptions, SyncConfig, SyncStore};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A client wired to a mock gateway, with automatic cleanup.
pub struct TestClient {
    /// The client instance.
    pub client: Client,
    /// The mock server behind the client.
    pub gateway: Arc<MockGateway>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestClient {
    /// Creates a client over in-memory local storage.
    pub fn memory() -> Self {
        Self::memory_with(SyncConfig::default())
    }

    /// Creates a client over in-memory local storage with `config`.
    pub fn memory_with(config: SyncConfig) -> Self {
        let gateway = Arc::new(MockGateway::new());
        let client = Client::new(LocalStorage::in_memory(), gateway.clone(), config)
            .expect("Failed to create client");
        Self {
            client,
            gateway,
            _temp_dir: None,
        }
    }

    /// Creates a client over file-backed local storage in a temp directory.
    pub async fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let gateway = Arc::new(MockGateway::new());
        let client = file_client(temp_dir.path(), gateway.clone()).await;
        Self {
            client,
            gateway,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Opens a second client over the same local files and server, as a
    /// restarted application would.
    pub async fn reopen(&self) -> Client {
        let dir = self
            ._temp_dir
            .as_ref()
            .expect("Only file-backed clients can be reopened");
        file_client(dir.path(), self.gateway.clone()).await
    }

    /// Returns the local data directory if file-based.
    pub fn path(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(TempDir::path)
    }

    /// Returns an untagged sync store for `collection`.
    pub fn sync_store(&self, collection: &str) -> SyncStore {
        self.client
            .sync_store(collection, StoreOptions::new())
            .expect("Failed to create sync store")
    }
}

impl std::ops::Deref for TestClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

async fn file_client(root: &Path, gateway: Arc<MockGateway>) -> Client {
    let backend = FileStore::open(root)
        .await
        .expect("Failed to open file store");
    Client::new(LocalStorage::new(backend), gateway, SyncConfig::default())
        .expect("Failed to create client")
}

/// Builds `count` entities with a `title` and an `index` field.
pub fn sample_entities(count: usize) -> Vec<Entity> {
    (0..count)
        .map(|i| {
            Entity::new()
                .with_field("title", json!(format!("book {i}")))
                .with_field("index", json!(i))
        })
        .collect()
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use docsync_sync_engine::DataStore;

    /// A server holding `entity_count` entities in `collection`.
    pub fn populated_server(collection: &str, entity_count: usize) -> TestClient {
        let test_client = TestClient::memory();
        let entities = (0..entity_count)
            .map(|i| Entity::with_id(format!("srv-{i:06}")).with_field("index", json!(i)))
            .collect();
        test_client.gateway.insert(collection, entities);
        test_client
    }

    /// A client with `pending` offline creates queued in `collection`.
    pub async fn pending_creates(collection: &str, pending: usize) -> (TestClient, SyncStore) {
        let test_client = TestClient::memory();
        let store = test_client.sync_store(collection);
        for entity in sample_entities(pending) {
            store
                .create(entity)
                .await
                .expect("Failed to create entity");
        }
        (test_client, store)
    }
}
