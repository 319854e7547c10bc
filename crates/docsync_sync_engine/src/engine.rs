//! Push and pull reconciliation between the local cache and the server.

use crate::config::{PullOptions, DEFAULT_PUSH_BATCH_SIZE};
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use crate::guard::PushGuard;
use docsync_core::{Cache, LocalStorage, Namespace, QueryCache, SyncQueue};
use docsync_protocol::{Entity, PushResult, Query, SyncOperation, SyncQueueEntry};
use futures::future::{join_all, try_join_all};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

/// Statistics about push and pull operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Pushes that ran to completion.
    pub pushes_completed: u64,
    /// Queue entries reconciled by pushes.
    pub entities_pushed: u64,
    /// Queue entries that failed to push.
    pub push_failures: u64,
    /// Pulls that ran to completion.
    pub pulls_completed: u64,
    /// Documents fetched or changed by pulls.
    pub entities_pulled: u64,
    /// Time of the last completed push.
    pub last_push_time: Option<Instant>,
    /// Time of the last completed pull.
    pub last_pull_time: Option<Instant>,
}

/// Synchronizes one (collection, tag) namespace with the server.
///
/// `push` drains the sync queue against the gateway and folds the server
/// copies back into the cache. `pull` fetches from the gateway into the
/// cache, optionally incrementally, and advances query bookkeeping.
///
/// # Invariants
///
/// - At most one push per namespace is in flight, across every engine
///   sharing the same [`PushGuard`]
/// - A pull never runs while entries it could overwrite are still queued
/// - Item-level push failures are reported per item and never abort the
///   push
pub struct SyncEngine {
    namespace: Namespace,
    cache: Cache<Entity>,
    queue: SyncQueue,
    query_cache: QueryCache,
    gateway: Arc<dyn RemoteGateway>,
    guard: PushGuard,
    batch_size: usize,
    stats: RwLock<SyncStats>,
}

impl SyncEngine {
    /// Creates an engine for `namespace`.
    pub fn new(
        storage: &LocalStorage,
        namespace: Namespace,
        gateway: Arc<dyn RemoteGateway>,
        guard: PushGuard,
    ) -> SyncResult<Self> {
        let tag = namespace.tag();
        Ok(Self {
            cache: storage.cache(namespace.clone()),
            queue: SyncQueue::new(storage, tag)?,
            query_cache: QueryCache::new(storage, tag)?,
            namespace,
            gateway,
            guard,
            batch_size: DEFAULT_PUSH_BATCH_SIZE,
            stats: RwLock::new(SyncStats::default()),
        })
    }

    /// Sets how many queue entries are pushed concurrently.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        self.namespace.collection()
    }

    /// Returns the namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Returns the entity cache.
    pub fn cache(&self) -> &Cache<Entity> {
        &self.cache
    }

    /// Returns the sync queue.
    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Returns the query cache.
    pub fn query_cache(&self) -> &QueryCache {
        &self.query_cache
    }

    /// Returns the gateway.
    pub fn gateway(&self) -> &Arc<dyn RemoteGateway> {
        &self.gateway
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the queue entries whose entity matches `query`.
    pub async fn pending_entries(&self, query: Option<&Query>) -> SyncResult<Vec<SyncQueueEntry>> {
        Ok(self.queue.find_for_entities(self.collection(), query).await?)
    }

    /// Counts the queue entries whose entity matches `query`.
    pub async fn pending_count(&self, query: Option<&Query>) -> SyncResult<usize> {
        Ok(self
            .queue
            .count_for_entities(self.collection(), query)
            .await?)
    }

    /// Drops the queue entries whose entity matches `query` without pushing
    /// them.
    pub async fn clear_sync(&self, query: Option<&Query>) -> SyncResult<usize> {
        Ok(self.queue.clear(self.collection(), query).await?)
    }

    /// Pushes the queued operations whose entity matches `query`.
    ///
    /// Entries are sent in sequential batches; the entries of one batch are
    /// sent concurrently. Returns one result per entry, in queue order.
    ///
    /// # Errors
    ///
    /// Fails as a whole only if the query is malformed, the queue cannot be
    /// read, or another push of this namespace is in flight.
    #[instrument(skip(self, query), fields(namespace = %self.namespace))]
    pub async fn push(&self, query: Option<&Query>) -> SyncResult<Vec<PushResult>> {
        if let Some(query) = query {
            query.validate()?;
        }
        let _permit = self.guard.try_acquire(&self.namespace)?;

        let entries = self.pending_entries(query).await?;
        let mut results = Vec::with_capacity(entries.len());
        for batch in entries.chunks(self.batch_size) {
            let outcomes = join_all(batch.iter().map(|entry| self.push_entry(entry))).await;
            results.extend(outcomes);
        }

        let failures = results.iter().filter(|r| !r.is_success()).count();
        {
            let mut stats = self.stats.write();
            stats.pushes_completed += 1;
            stats.entities_pushed += (results.len() - failures) as u64;
            stats.push_failures += failures as u64;
            stats.last_push_time = Some(Instant::now());
        }
        debug!(pushed = results.len(), failures, "push complete");
        Ok(results)
    }

    async fn push_entry(&self, entry: &SyncQueueEntry) -> PushResult {
        let operation = entry.operation().clone();
        match entry.operation() {
            SyncOperation::Delete => match self.push_delete(entry).await {
                Ok(()) => PushResult::success(&entry.entity_id, operation, None),
                Err(err) => {
                    PushResult::failure(&entry.entity_id, operation, None, err.to_push_error())
                }
            },
            SyncOperation::Create | SyncOperation::Update => self.push_save(entry, operation).await,
            SyncOperation::Unrecognized(name) => {
                let err = SyncError::OperationNotRecognized {
                    operation: name.clone(),
                };
                PushResult::failure(&entry.entity_id, operation, None, err.to_push_error())
            }
        }
    }

    async fn push_delete(&self, entry: &SyncQueueEntry) -> SyncResult<()> {
        match self
            .gateway
            .remove_by_id(self.collection(), &entry.entity_id)
            .await
        {
            Ok(_) => {}
            Err(err) if err.is_not_found() => {
                debug!(entity_id = %entry.entity_id, "already deleted on server");
            }
            Err(err) => return Err(err.into()),
        }
        self.dequeue(entry).await
    }

    async fn push_save(&self, entry: &SyncQueueEntry, operation: SyncOperation) -> PushResult {
        let id = entry.entity_id.as_str();
        let entity = match self.cache.find_by_id(id).await {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                let err = match self.dequeue(entry).await {
                    Ok(()) => SyncError::EntityMissing {
                        collection: self.collection().to_owned(),
                        entity_id: id.to_owned(),
                    },
                    Err(err) => err,
                };
                return PushResult::failure(id, operation, None, err.to_push_error());
            }
            Err(err) => {
                return PushResult::failure(id, operation, None, SyncError::from(err).to_push_error())
            }
        };

        let local = entity.is_local();
        let response = if local {
            let mut request = entity.clone();
            request.id = None;
            request.clear_local();
            self.gateway.create(self.collection(), request).await
        } else if operation == SyncOperation::Create {
            self.gateway.create(self.collection(), entity.clone()).await
        } else {
            self.gateway.update(self.collection(), entity.clone()).await
        };

        let outcome = match response {
            Ok(server_entity) => self.reconcile(entry, local, server_entity).await,
            Err(err) => Err(err.into()),
        };
        match outcome {
            Ok(saved) => PushResult::success(id, operation, Some(saved)),
            Err(err) => PushResult::failure(id, operation, Some(entity), err.to_push_error()),
        }
    }

    /// Folds a server copy back into the cache after a successful save.
    async fn reconcile(
        &self,
        entry: &SyncQueueEntry,
        local: bool,
        server_entity: Entity,
    ) -> SyncResult<Entity> {
        self.dequeue(entry).await?;
        let saved = self.cache.save(server_entity).await?;
        if local && saved.id() != Some(entry.entity_id.as_str()) {
            self.cache.remove_by_id(&entry.entity_id).await?;
        }
        Ok(saved)
    }

    async fn dequeue(&self, entry: &SyncQueueEntry) -> SyncResult<()> {
        match entry.id.as_deref() {
            Some(id) => self.queue.remove_by_id(id).await?,
            None => {
                self.queue
                    .remove_for_entity(self.collection(), &entry.entity_id)
                    .await?
            }
        };
        Ok(())
    }

    /// Fetches entities matching `query` from the server into the cache and
    /// returns how many were fetched or changed.
    ///
    /// With `use_delta_set` and an unbounded query that was pulled before,
    /// only changes since that pull are fetched. With `auto_pagination`, the
    /// collection cache is cleared and refilled page by page. Otherwise one
    /// full fetch runs; without a query, the collection cache is cleared
    /// first. A query that is pulled with a filter only upserts: cached
    /// entities that no longer match remotely stay cached.
    ///
    /// # Errors
    ///
    /// Fails with a data integrity error naming the count if queue entries
    /// matching `query` are pending; push them first.
    #[instrument(skip(self, query, options), fields(namespace = %self.namespace))]
    pub async fn pull(&self, query: Option<&Query>, options: &PullOptions) -> SyncResult<usize> {
        if let Some(query) = query {
            query.validate()?;
        }
        let pending = self.pending_count(query).await?;
        if pending > 0 {
            return Err(SyncError::data_integrity(format!(
                "unable to pull {}: {pending} pending sync item(s) must be pushed first",
                self.namespace
            )));
        }

        let everything = Query::new();
        let scope = query.unwrap_or(&everything);

        let mut fetched = None;
        if options.use_delta_set && scope.is_unbounded() {
            fetched = self.pull_delta_set(query, scope).await?;
        }
        let fetched = match (fetched, options.auto_pagination) {
            (Some(count), _) => count,
            (None, Some(page_size)) => self.pull_paginated(query, scope, page_size).await?,
            (None, None) => self.pull_full(query, scope).await?,
        };

        {
            let mut stats = self.stats.write();
            stats.pulls_completed += 1;
            stats.entities_pulled += fetched as u64;
            stats.last_pull_time = Some(Instant::now());
        }
        debug!(fetched, "pull complete");
        Ok(fetched)
    }

    /// Returns `None` when the delta set cannot be used and a regular fetch
    /// must run instead.
    async fn pull_delta_set(&self, query: Option<&Query>, scope: &Query) -> SyncResult<Option<usize>> {
        let since = match self.query_cache.find_entry(self.collection(), scope).await? {
            Some(entry) => entry.last_request,
            None => None,
        };
        let Some(since) = since else {
            return Ok(None);
        };

        let delta = match self
            .gateway
            .find_with_delta_set(self.collection(), query, &since)
            .await
        {
            Ok(delta) => delta,
            Err(err) if err.is_delta_set_unsupported() => {
                debug!(error = %err, "delta set unavailable, falling back to full fetch");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        for deleted in &delta.deleted {
            self.cache.remove_by_id(&deleted.id).await?;
        }
        let changed = delta.changed.len();
        self.cache.save_many(delta.changed).await?;
        self.query_cache
            .record(self.collection(), scope, delta.request_start)
            .await?;
        debug!(changed, deleted = delta.deleted.len(), "delta set applied");
        Ok(Some(changed))
    }

    async fn pull_paginated(
        &self,
        query: Option<&Query>,
        scope: &Query,
        page_size: usize,
    ) -> SyncResult<usize> {
        if page_size == 0 {
            return Err(SyncError::validation("page size must be positive"));
        }
        let total = self.gateway.count(self.collection(), query).await?;
        self.cache.clear().await?;

        let base = scope.without_paging();
        let pages = (0..total.count).step_by(page_size).map(|skip| {
            let window = base.with_window(skip, page_size);
            async move {
                let page = self.gateway.find(self.collection(), Some(&window)).await?;
                let saved = self.cache.save_many(page.entities).await?;
                Ok::<usize, SyncError>(saved.len())
            }
        });
        let fetched: usize = try_join_all(pages).await?.into_iter().sum();

        self.query_cache
            .record(self.collection(), scope, total.request_start)
            .await?;
        Ok(fetched)
    }

    async fn pull_full(&self, query: Option<&Query>, scope: &Query) -> SyncResult<usize> {
        let response = self.gateway.find(self.collection(), query).await?;
        if query.is_none() {
            self.cache.clear().await?;
        }
        let fetched = self.cache.save_many(response.entities).await?.len();
        self.query_cache
            .record(self.collection(), scope, response.request_start)
            .await?;
        Ok(fetched)
    }
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("namespace", &self.namespace)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}
