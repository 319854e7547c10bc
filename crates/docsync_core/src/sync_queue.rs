//! Pending-operation queue shared by every collection of a tag.

use crate::cache::Cache;
use crate::error::{CoreError, CoreResult};
use crate::namespace::Namespace;
use crate::storage::LocalStorage;
use docsync_protocol::{Entity, Query, SyncOperation, SyncQueueEntry, ID_FIELD};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::debug;

const ENTITY_VIEW_FIELD: &str = "entity";

/// Durable record of operations awaiting reconciliation with the server.
///
/// Entries of every collection live in one namespace (`kinvey_sync`, or
/// `kinvey_sync.<tag>`) and are told apart by their `collection` field.
///
/// # Invariants
///
/// - At most one entry exists per (collection, entity id); adding an
///   operation for an entity replaces its previous entry
/// - A delete of an entity that never reached the server produces no entry
#[derive(Debug, Clone)]
pub struct SyncQueue {
    entries: Cache<SyncQueueEntry>,
    storage: LocalStorage,
    tag: Option<String>,
}

impl SyncQueue {
    /// Opens the queue for `tag`.
    pub fn new(storage: &LocalStorage, tag: Option<&str>) -> CoreResult<Self> {
        Ok(Self {
            entries: storage.cache(Namespace::sync_queue(tag)?),
            storage: storage.clone(),
            tag: tag.map(str::to_owned),
        })
    }

    /// Returns the underlying entry cache.
    pub fn entries(&self) -> &Cache<SyncQueueEntry> {
        &self.entries
    }

    /// Records `operation` for each entity of `collection`.
    ///
    /// Existing entries of the same entities are removed first. For
    /// [`SyncOperation::Delete`], entities flagged as local are dropped from
    /// the batch: they were never sent to the server, so there is nothing to
    /// delete remotely.
    ///
    /// # Errors
    ///
    /// Fails with a data integrity error, before anything is written, if an
    /// entity has no `_id`.
    pub async fn add_sync_event(
        &self,
        collection: &str,
        operation: SyncOperation,
        entities: &[Entity],
    ) -> CoreResult<Vec<SyncQueueEntry>> {
        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities {
            match entity.id() {
                Some(id) if !id.is_empty() => ids.push(id),
                _ => {
                    return Err(CoreError::data_integrity(format!(
                        "an entity in {collection} has no _id and cannot be queued for sync"
                    )))
                }
            }
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let superseded = Query::new()
            .equal_to("collection", json!(collection))
            .contained_in("entityId", ids.iter().map(|id| json!(id)).collect());

        let mut seen = HashSet::new();
        let new_entries: Vec<SyncQueueEntry> = entities
            .iter()
            .filter(|entity| operation != SyncOperation::Delete || !entity.is_local())
            .filter_map(Entity::id)
            .filter(|id| seen.insert(*id))
            .map(|id| SyncQueueEntry::new(collection, id, operation.clone()))
            .collect();

        debug!(
            collection,
            operation = %operation,
            queued = new_entries.len(),
            "sync event"
        );
        self.entries.replace(&superseded, new_entries).await
    }

    /// Returns queue entries matching a query over queue fields.
    pub async fn find(&self, query: Option<&Query>) -> CoreResult<Vec<SyncQueueEntry>> {
        self.entries.find(query).await
    }

    /// Counts queue entries matching a query over queue fields.
    pub async fn count(&self, query: Option<&Query>) -> CoreResult<usize> {
        self.entries.count(query).await
    }

    /// Removes queue entries matching a query over queue fields.
    pub async fn remove(&self, query: Option<&Query>) -> CoreResult<usize> {
        self.entries.remove(query).await
    }

    /// Removes one queue entry by its record id.
    pub async fn remove_by_id(&self, id: &str) -> CoreResult<usize> {
        self.entries.remove_by_id(id).await
    }

    /// Removes the entry of one entity, if queued.
    pub async fn remove_for_entity(&self, collection: &str, entity_id: &str) -> CoreResult<usize> {
        let query = Query::new()
            .equal_to("collection", json!(collection))
            .equal_to("entityId", json!(entity_id));
        self.entries.remove(Some(&query)).await
    }

    /// Returns the entries of `collection` whose entity matches `query`.
    ///
    /// `query` is evaluated against the cached entity each entry refers to.
    /// An entry whose entity is no longer cached is matched as `{ _id }`.
    /// Skip and limit are ignored: every pending entry in scope is returned.
    pub async fn find_for_entities(
        &self,
        collection: &str,
        query: Option<&Query>,
    ) -> CoreResult<Vec<SyncQueueEntry>> {
        let scope = Query::new().equal_to("collection", json!(collection));
        let entries = self.entries.find(Some(&scope)).await?;
        let Some(query) = query else {
            return Ok(entries);
        };
        query.validate()?;

        let cache: Cache<Entity> = self.entity_cache(collection)?;
        let mut views = Vec::with_capacity(entries.len());
        for entry in entries {
            let entity = match cache.find_by_id(&entry.entity_id).await? {
                Some(entity) => entity.to_value()?,
                None => json!({ ID_FIELD: entry.entity_id }),
            };
            let mut view = serde_json::to_value(&entry)?;
            if let Value::Object(fields) = &mut view {
                fields.insert(ENTITY_VIEW_FIELD.to_owned(), entity);
            }
            views.push(view);
        }

        query
            .without_paging()
            .prefixed(ENTITY_VIEW_FIELD)
            .process(views)
            .into_iter()
            .map(|mut view| {
                if let Value::Object(fields) = &mut view {
                    fields.remove(ENTITY_VIEW_FIELD);
                }
                serde_json::from_value(view).map_err(CoreError::from)
            })
            .collect()
    }

    /// Counts the entries of `collection` whose entity matches `query`.
    pub async fn count_for_entities(
        &self,
        collection: &str,
        query: Option<&Query>,
    ) -> CoreResult<usize> {
        Ok(self.find_for_entities(collection, query).await?.len())
    }

    /// Removes the entries of `collection` whose entity matches `query` and
    /// returns how many were removed.
    pub async fn clear(&self, collection: &str, query: Option<&Query>) -> CoreResult<usize> {
        let entries = self.find_for_entities(collection, query).await?;
        let ids: HashSet<&str> = entries.iter().filter_map(|e| e.id.as_deref()).collect();
        let mut removed = 0;
        for id in ids {
            removed += self.entries.remove_by_id(id).await?;
        }
        Ok(removed)
    }

    fn entity_cache(&self, collection: &str) -> CoreResult<Cache<Entity>> {
        Ok(self
            .storage
            .cache(Namespace::new(collection, self.tag.as_deref())?))
    }
}
