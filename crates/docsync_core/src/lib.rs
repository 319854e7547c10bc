//! # docsync Core
//!
//! Local document store layer for docsync.
//!
//! This crate provides:
//! - [`Cache`], a typed document table over one (collection, tag) namespace
//!   with local id generation and a single-writer queue per namespace
//! - [`SyncQueue`], the record of operations awaiting push
//! - [`QueryCache`], the bookkeeping that enables delta-set fetches
//! - [`LocalStorage`], the shared handle tying caches to one backend
//!
//! Nothing here talks to the network; see `docsync_sync_engine`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod document;
mod error;
mod namespace;
mod query_cache;
mod storage;
mod sync_queue;

pub use cache::Cache;
pub use document::{generate_id, Document, LOCAL_ID_LEN};
pub use error::{CoreError, CoreResult};
pub use namespace::{validate_tag, Namespace, QUERY_CACHE_COLLECTION, SYNC_QUEUE_COLLECTION};
pub use query_cache::QueryCache;
pub use storage::LocalStorage;
pub use sync_queue::SyncQueue;
