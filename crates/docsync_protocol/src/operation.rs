//! Pending sync operations and incremental-fetch bookkeeping records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of pending operation recorded for an entity.
///
/// Operations are persisted as the HTTP verb they replay as. A persisted
/// verb this version does not know decodes to [`SyncOperation::Unrecognized`]
/// instead of failing, so one corrupted record cannot poison a whole queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncOperation {
    /// Entity was created locally.
    Create,
    /// Entity was updated locally.
    Update,
    /// Entity was deleted locally.
    Delete,
    /// A persisted operation name that is not understood.
    Unrecognized(String),
}

impl SyncOperation {
    /// Returns the persisted name of the operation.
    pub fn as_str(&self) -> &str {
        match self {
            SyncOperation::Create => "POST",
            SyncOperation::Update => "PUT",
            SyncOperation::Delete => "DELETE",
            SyncOperation::Unrecognized(name) => name,
        }
    }
}

impl From<String> for SyncOperation {
    fn from(name: String) -> Self {
        match name.as_str() {
            "POST" => SyncOperation::Create,
            "PUT" => SyncOperation::Update,
            "DELETE" => SyncOperation::Delete,
            _ => SyncOperation::Unrecognized(name),
        }
    }
}

impl From<SyncOperation> for String {
    fn from(op: SyncOperation) -> Self {
        match op {
            SyncOperation::Unrecognized(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State block of a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntryState {
    /// The pending operation.
    pub operation: SyncOperation,
}

/// One pending operation for one entity.
///
/// # Invariants
///
/// - At most one entry exists per `entity_id` at any time
/// - `collection` discriminates entries of different collections sharing the
///   same queue namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    /// Queue record id, assigned when the entry is stored.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Id of the entity the operation applies to.
    #[serde(rename = "entityId")]
    pub entity_id: String,
    /// Collection the entity belongs to.
    pub collection: String,
    /// Pending operation.
    pub state: SyncEntryState,
}

impl SyncQueueEntry {
    /// Creates an unsaved entry.
    pub fn new(
        collection: impl Into<String>,
        entity_id: impl Into<String>,
        operation: SyncOperation,
    ) -> Self {
        Self {
            id: None,
            entity_id: entity_id.into(),
            collection: collection.into(),
            state: SyncEntryState { operation },
        }
    }

    /// Returns the pending operation.
    pub fn operation(&self) -> &SyncOperation {
        &self.state.operation
    }
}

/// Bookkeeping for one distinct unbounded query of one collection.
///
/// `last_request` is the server-reported start time of the last successful
/// fetch and is used as the `since` baseline of the next delta-set fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCacheEntry {
    /// Record id, assigned when the entry is stored.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Collection the query runs against.
    pub collection: String,
    /// Stable serialization of the query without skip and limit.
    pub query: String,
    /// Server request-start token of the last fetch.
    #[serde(rename = "lastRequest", default, skip_serializing_if = "Option::is_none")]
    pub last_request: Option<String>,
}

impl QueryCacheEntry {
    /// Creates an unsaved entry.
    pub fn new(collection: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: None,
            collection: collection.into(),
            query: query.into(),
            last_request: None,
        }
    }
}
