//! # docsync Storage
//!
//! Keyed document store trait and implementations for docsync.
//!
//! This crate provides the lowest-level storage abstraction for docsync.
//! A store is a set of independent **namespaces**, each a table of JSON
//! documents keyed by their `_id` field. Stores do not interpret documents
//! beyond reading that key.
//!
//! ## Design Principles
//!
//! - Stores are simple document tables (find, upsert, delete)
//! - No knowledge of entities, sync queues or query semantics
//! - Must be `Send + Sync` for concurrent access
//! - Every document must carry a non-empty string `_id`
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral caches
//! - [`FileStore`] - One JSON file per namespace on disk
//!
//! ## Example
//!
//! ```rust
//! use docsync_storage::{InMemoryStore, KeyedDocumentStore};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = InMemoryStore::new();
//! store.save("books", vec![json!({ "_id": "b1", "title": "Dune" })]).await.unwrap();
//! let found = store.find_by_id("books", "b1").await.unwrap();
//! assert_eq!(found.unwrap()["title"], "Dune");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{document_id, KeyedDocumentStore, ID_FIELD};
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
