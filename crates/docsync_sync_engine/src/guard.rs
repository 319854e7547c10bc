//! Per-collection push exclusion.

use crate::error::{SyncError, SyncResult};
use docsync_core::Namespace;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Registry of namespaces with a push in flight.
///
/// A second push of the same namespace fails instead of queueing. The check
/// and the set happen in one critical section, so two concurrent callers
/// can never both acquire.
#[derive(Debug, Clone, Default)]
pub struct PushGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl PushGuard {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `namespace` as pushing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::PushInProgress`] if a permit for the namespace is
    /// still alive.
    pub fn try_acquire(&self, namespace: &Namespace) -> SyncResult<PushPermit> {
        let key = namespace.key();
        if !self.in_flight.lock().insert(key.clone()) {
            return Err(SyncError::PushInProgress { collection: key });
        }
        Ok(PushPermit {
            guard: self.clone(),
            key,
        })
    }

    /// Returns true if a push of `namespace` is in flight.
    pub fn is_pushing(&self, namespace: &Namespace) -> bool {
        self.in_flight.lock().contains(&namespace.key())
    }
}

/// Proof of an in-flight push; releases the namespace when dropped.
#[derive(Debug)]
pub struct PushPermit {
    guard: PushGuard,
    key: String,
}

impl PushPermit {
    /// Returns the namespace key this permit holds.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for PushPermit {
    fn drop(&mut self) {
        self.guard.in_flight.lock().remove(&self.key);
    }
}
