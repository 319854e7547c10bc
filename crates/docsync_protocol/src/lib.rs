//! # docsync Protocol
//!
//! Document, query and sync-record types shared by docsync crates.
//!
//! This crate provides:
//! - [`Entity`] and its reserved [`Metadata`] block
//! - [`Query`] and [`Aggregation`], the minimal query capability used by
//!   local stores
//! - [`SyncQueueEntry`] and [`QueryCacheEntry`], the bookkeeping records
//! - [`PushResult`], the per-entity outcome of a push
//! - [`GatewayError`] and the remote response shapes
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod aggregation;
mod entity;
mod error;
mod gateway;
mod operation;
mod push;
mod query;

pub use aggregation::{Aggregation, Reducer};
pub use entity::{Entity, Metadata, ID_FIELD, METADATA_FIELD};
pub use error::{ProtocolError, ProtocolResult};
pub use gateway::{
    CountResponse, DeletedEntity, DeltaSetResponse, FindResponse, GatewayError, GatewayErrorKind,
};
pub use operation::{QueryCacheEntry, SyncEntryState, SyncOperation, SyncQueueEntry};
pub use push::{PushError, PushErrorKind, PushResult};
pub use query::{Query, SortDirection};
