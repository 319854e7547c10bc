//! Documents a [`Cache`](crate::Cache) can hold, and local id generation.

use docsync_protocol::{Entity, QueryCacheEntry, SyncQueueEntry};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Length of a generated local identifier.
pub const LOCAL_ID_LEN: usize = 24;

/// A JSON document keyed by a string `_id`.
///
/// Implementors serialize to an object whose `_id` member mirrors
/// [`Document::id`].
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Returns the document id, if assigned.
    fn id(&self) -> Option<&str>;

    /// Assigns the document id.
    fn set_id(&mut self, id: String);

    /// Called after the cache generated an id for this document.
    fn mark_generated_id(&mut self) {}
}

impl Document for Entity {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn mark_generated_id(&mut self) {
        self.mark_local();
    }
}

impl Document for SyncQueueEntry {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl Document for QueryCacheEntry {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// Generates a random 24-character lowercase hex identifier.
#[must_use]
pub fn generate_id() -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..LOCAL_ID_LEN)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect()
}
