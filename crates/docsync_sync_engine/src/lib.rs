//! # DocSync Sync Engine
//!
//! Push/pull reconciliation and access modes for DocSync.
//!
//! This crate provides:
//! - The remote gateway abstraction and an in-memory mock server
//! - Push: replaying the sync queue against the server in batches
//! - Pull: full, auto-paginated and delta-set fetches into the cache
//! - Per-collection push exclusion
//! - Network, Sync and Cache data stores
//!
//! ## Architecture
//!
//! The engine implements a **push-before-pull** model:
//! 1. Local writes land in the cache and record a queue entry
//! 2. Push replays queued entries; server copies replace local ones
//! 3. Pull refuses to run while matching entries are still queued
//!
//! ## Key Invariants
//!
//! - Local edits are never dropped by a pull
//! - A queued entry leaves the queue only once the server acknowledged it
//! - Entities created offline are never deleted remotely
//! - At most one push per collection and tag is in flight

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod engine;
mod error;
mod gateway;
mod guard;
mod store;

pub use client::Client;
pub use config::{
    PullOptions, StoreOptions, SyncConfig, DEFAULT_PAGE_SIZE, DEFAULT_PUSH_BATCH_SIZE,
};
pub use engine::{SyncEngine, SyncStats};
pub use error::{SyncError, SyncResult};
pub use gateway::{method, GatewayResult, MockGateway, RemoteGateway};
pub use guard::{PushGuard, PushPermit};
pub use store::{
    CacheStore, DataStore, DataStoreType, NetworkStore, OfflineDataStore, SyncOutcome, SyncStore,
};

pub use docsync_protocol::{
    CountResponse, DeltaSetResponse, DeletedEntity, FindResponse, GatewayError,
    GatewayErrorKind, PushError, PushErrorKind, PushResult,
};
