//! Remote gateway abstraction for sync operations.

use async_trait::async_trait;
use docsync_protocol::{
    CountResponse, DeletedEntity, DeltaSetResponse, Entity, FindResponse, GatewayError,
    GatewayErrorKind, Metadata, Query,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Result type for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// The only component that talks to the network.
///
/// Every call is scoped to one collection. Failures carry a
/// [`GatewayErrorKind`] that callers inspect instead of matching messages.
/// Responses that advance delta-set bookkeeping expose the server's
/// request-start token, an opaque value that orders like server time.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetches the entities matching `query`, or all entities.
    async fn find(&self, collection: &str, query: Option<&Query>) -> GatewayResult<FindResponse>;

    /// Fetches what changed since the `since` token.
    ///
    /// May fail with [`GatewayErrorKind::MissingConfiguration`] or
    /// [`GatewayErrorKind::ParameterValueOutOfRange`] when delta sets are
    /// unavailable for this query or app.
    async fn find_with_delta_set(
        &self,
        collection: &str,
        query: Option<&Query>,
        since: &str,
    ) -> GatewayResult<DeltaSetResponse>;

    /// Fetches one entity.
    async fn find_by_id(&self, collection: &str, id: &str) -> GatewayResult<Entity>;

    /// Counts the entities matching `query`, or all entities.
    async fn count(&self, collection: &str, query: Option<&Query>)
        -> GatewayResult<CountResponse>;

    /// Creates one entity and returns the server copy.
    async fn create(&self, collection: &str, entity: Entity) -> GatewayResult<Entity>;

    /// Replaces one entity by its `_id` and returns the server copy.
    async fn update(&self, collection: &str, entity: Entity) -> GatewayResult<Entity>;

    /// Deletes one entity. A missing entity fails with
    /// [`GatewayErrorKind::NotFound`].
    async fn remove_by_id(&self, collection: &str, id: &str) -> GatewayResult<usize>;

    /// Deletes the entities matching `query`, or all entities.
    async fn remove(&self, collection: &str, query: Option<&Query>) -> GatewayResult<usize>;
}

/// Gateway method names, as counted by [`MockGateway::calls`].
pub mod method {
    /// [`super::RemoteGateway::find`]
    pub const FIND: &str = "find";
    /// [`super::RemoteGateway::find_with_delta_set`]
    pub const FIND_WITH_DELTA_SET: &str = "find_with_delta_set";
    /// [`super::RemoteGateway::find_by_id`]
    pub const FIND_BY_ID: &str = "find_by_id";
    /// [`super::RemoteGateway::count`]
    pub const COUNT: &str = "count";
    /// [`super::RemoteGateway::create`]
    pub const CREATE: &str = "create";
    /// [`super::RemoteGateway::update`]
    pub const UPDATE: &str = "update";
    /// [`super::RemoteGateway::remove_by_id`]
    pub const REMOVE_BY_ID: &str = "remove_by_id";
    /// [`super::RemoteGateway::remove`]
    pub const REMOVE: &str = "remove";
}

#[derive(Debug, Clone)]
struct StoredEntity {
    entity: Entity,
    modified_at: u64,
}

#[derive(Debug, Default)]
struct MockState {
    collections: HashMap<String, BTreeMap<String, StoredEntity>>,
    tombstones: HashMap<String, Vec<(String, u64)>>,
    clock: u64,
    next_id: u64,
    offline: bool,
    delta_set_error: Option<GatewayErrorKind>,
    failing_creates: Vec<Query>,
    scripted_failures: HashMap<&'static str, VecDeque<GatewayError>>,
    calls: HashMap<&'static str, usize>,
}

impl MockState {
    /// Counts the call, advances the clock and applies injected faults.
    fn begin(&mut self, method: &'static str) -> GatewayResult<String> {
        *self.calls.entry(method).or_default() += 1;
        if self.offline {
            return Err(GatewayError::network("mock gateway is offline"));
        }
        if let Some(err) = self
            .scripted_failures
            .get_mut(method)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        self.clock += 1;
        Ok(token(self.clock))
    }

    fn table(&mut self, collection: &str) -> &mut BTreeMap<String, StoredEntity> {
        self.collections.entry(collection.to_owned()).or_default()
    }

    fn values(&self, collection: &str) -> Vec<serde_json::Value> {
        self.collections
            .get(collection)
            .map(|table| {
                table
                    .values()
                    .filter_map(|stored| stored.entity.to_value().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn upsert(&mut self, collection: &str, mut entity: Entity, request_start: &str) -> Entity {
        let id = match entity.id.clone() {
            Some(id) => id,
            None => {
                self.next_id += 1;
                let id = format!("srv-{:06}", self.next_id);
                entity.id = Some(id.clone());
                id
            }
        };
        let clock = self.clock;
        let table = self.table(collection);
        let ect = table
            .get(&id)
            .and_then(|prior| prior.entity.metadata.as_ref())
            .and_then(|kmd| kmd.ect.clone())
            .unwrap_or_else(|| request_start.to_owned());
        let kmd = entity.metadata.get_or_insert_with(Metadata::default);
        kmd.local = false;
        kmd.lmt = Some(request_start.to_owned());
        kmd.ect = Some(ect);
        table.insert(
            id,
            StoredEntity {
                entity: entity.clone(),
                modified_at: clock,
            },
        );
        entity
    }

    fn delete(&mut self, collection: &str, id: &str) -> bool {
        let clock = self.clock;
        let removed = self.table(collection).remove(id).is_some();
        if removed {
            self.tombstones
                .entry(collection.to_owned())
                .or_default()
                .push((id.to_owned(), clock));
        }
        removed
    }
}

fn token(clock: u64) -> String {
    format!("{clock:020}")
}

fn decode(values: Vec<serde_json::Value>) -> GatewayResult<Vec<Entity>> {
    values
        .into_iter()
        .map(|value| {
            Entity::from_value(value)
                .map_err(|e| GatewayError::new(GatewayErrorKind::InvalidResponse, e.to_string()))
        })
        .collect()
}

/// An in-memory server for testing.
///
/// Behaves like a collection store with a logical clock: every successful
/// call advances the clock and reports it as the request-start token.
/// Deletions leave tombstones so delta-set fetches can report them.
#[derive(Debug, Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    /// Creates an empty, online mock gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores entities directly on the server side.
    pub fn insert(&self, collection: &str, entities: Vec<Entity>) -> Vec<Entity> {
        let mut state = self.state.lock();
        state.clock += 1;
        let request_start = token(state.clock);
        entities
            .into_iter()
            .map(|entity| state.upsert(collection, entity, &request_start))
            .collect()
    }

    /// Deletes an entity on the server side, as another client would.
    pub fn delete(&self, collection: &str, id: &str) -> bool {
        let mut state = self.state.lock();
        state.clock += 1;
        state.delete(collection, id)
    }

    /// Returns the server copy of every entity in `collection`.
    pub fn entities(&self, collection: &str) -> Vec<Entity> {
        let state = self.state.lock();
        state
            .collections
            .get(collection)
            .map(|table| table.values().map(|s| s.entity.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the server copy of one entity.
    pub fn entity(&self, collection: &str, id: &str) -> Option<Entity> {
        let state = self.state.lock();
        state
            .collections
            .get(collection)
            .and_then(|table| table.get(id))
            .map(|stored| stored.entity.clone())
    }

    /// Makes every call fail with a connectivity error while set.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Makes delta-set fetches fail with `kind`, or succeed again with `None`.
    pub fn set_delta_set_error(&self, kind: Option<GatewayErrorKind>) {
        self.state.lock().delta_set_error = kind;
    }

    /// Makes `create` fail for entities matching `query`.
    pub fn fail_creates_matching(&self, query: Query) {
        self.state.lock().failing_creates.push(query);
    }

    /// Makes the next call of `method` fail with `error`.
    pub fn fail_next(&self, method: &'static str, error: GatewayError) {
        self.state
            .lock()
            .scripted_failures
            .entry(method)
            .or_default()
            .push_back(error);
    }

    /// Returns how many times `method` was called.
    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().calls.get(method).copied().unwrap_or(0)
    }

    /// Returns the current logical clock as a request-start token.
    pub fn now(&self) -> String {
        token(self.state.lock().clock)
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn find(&self, collection: &str, query: Option<&Query>) -> GatewayResult<FindResponse> {
        let mut state = self.state.lock();
        let request_start = state.begin(method::FIND)?;
        let values = state.values(collection);
        let values = match query {
            Some(query) => query.process(values),
            None => values,
        };
        Ok(FindResponse {
            entities: decode(values)?,
            request_start: Some(request_start),
        })
    }

    async fn find_with_delta_set(
        &self,
        collection: &str,
        query: Option<&Query>,
        since: &str,
    ) -> GatewayResult<DeltaSetResponse> {
        let mut state = self.state.lock();
        let request_start = state.begin(method::FIND_WITH_DELTA_SET)?;
        if let Some(kind) = state.delta_set_error {
            return Err(GatewayError::new(kind, "delta set is not available"));
        }
        let since: u64 = since.parse().map_err(|_| {
            GatewayError::new(
                GatewayErrorKind::ParameterValueOutOfRange,
                format!("invalid since token {since:?}"),
            )
        })?;

        let filter = query.map(Query::without_paging).unwrap_or_default();
        let changed: Vec<serde_json::Value> = state
            .collections
            .get(collection)
            .map(|table| {
                table
                    .values()
                    .filter(|stored| stored.modified_at > since)
                    .filter_map(|stored| stored.entity.to_value().ok())
                    .filter(|value| filter.matches(value))
                    .collect()
            })
            .unwrap_or_default();
        let deleted: Vec<DeletedEntity> = state
            .tombstones
            .get(collection)
            .map(|stones| {
                stones
                    .iter()
                    .filter(|(_, at)| *at > since)
                    .map(|(id, _)| DeletedEntity { id: id.clone() })
                    .collect()
            })
            .unwrap_or_default();

        Ok(DeltaSetResponse {
            changed: decode(changed)?,
            deleted,
            request_start: Some(request_start),
        })
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> GatewayResult<Entity> {
        let mut state = self.state.lock();
        state.begin(method::FIND_BY_ID)?;
        state
            .collections
            .get(collection)
            .and_then(|table| table.get(id))
            .map(|stored| stored.entity.clone())
            .ok_or_else(|| GatewayError::not_found(format!("{collection}/{id} not found")))
    }

    async fn count(
        &self,
        collection: &str,
        query: Option<&Query>,
    ) -> GatewayResult<CountResponse> {
        let mut state = self.state.lock();
        let request_start = state.begin(method::COUNT)?;
        let values = state.values(collection);
        let count = match query {
            Some(query) => query.without_paging().process(values).len(),
            None => values.len(),
        };
        Ok(CountResponse {
            count,
            request_start: Some(request_start),
        })
    }

    async fn create(&self, collection: &str, entity: Entity) -> GatewayResult<Entity> {
        let mut state = self.state.lock();
        let request_start = state.begin(method::CREATE)?;
        let value = entity
            .to_value()
            .map_err(|e| GatewayError::new(GatewayErrorKind::InvalidResponse, e.to_string()))?;
        if state.failing_creates.iter().any(|q| q.matches(&value)) {
            return Err(GatewayError::server("create rejected"));
        }
        Ok(state.upsert(collection, entity, &request_start))
    }

    async fn update(&self, collection: &str, entity: Entity) -> GatewayResult<Entity> {
        let mut state = self.state.lock();
        let request_start = state.begin(method::UPDATE)?;
        if entity.id().is_none() {
            return Err(GatewayError::new(
                GatewayErrorKind::ParameterValueOutOfRange,
                "update requires an _id",
            ));
        }
        Ok(state.upsert(collection, entity, &request_start))
    }

    async fn remove_by_id(&self, collection: &str, id: &str) -> GatewayResult<usize> {
        let mut state = self.state.lock();
        state.begin(method::REMOVE_BY_ID)?;
        if state.delete(collection, id) {
            Ok(1)
        } else {
            Err(GatewayError::not_found(format!("{collection}/{id} not found")))
        }
    }

    async fn remove(&self, collection: &str, query: Option<&Query>) -> GatewayResult<usize> {
        let mut state = self.state.lock();
        state.begin(method::REMOVE)?;
        let values = state.values(collection);
        let matched = match query {
            Some(query) => query.without_paging().process(values),
            None => values,
        };
        let ids: Vec<String> = matched
            .iter()
            .filter_map(|value| value.get("_id").and_then(|id| id.as_str()))
            .map(str::to_owned)
            .collect();
        Ok(ids.iter().filter(|id| state.delete(collection, id)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_assigns_server_id_and_metadata() {
        let gateway = MockGateway::new();
        let created = gateway
            .create("books", Entity::new().with_field("title", json!("Dune")))
            .await
            .unwrap();

        let id = created.id().unwrap();
        assert!(id.starts_with("srv-"));
        assert!(!created.is_local());
        assert!(created.metadata.as_ref().unwrap().lmt.is_some());
        assert_eq!(gateway.entity("books", id), Some(created.clone()));
        assert_eq!(gateway.calls(method::CREATE), 1);
    }

    #[tokio::test]
    async fn offline_fails_with_connectivity_kind() {
        let gateway = MockGateway::new();
        gateway.set_offline(true);
        let err = gateway.find("books", None).await.unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(gateway.calls(method::FIND), 1);
    }

    #[tokio::test]
    async fn remove_missing_is_not_found() {
        let gateway = MockGateway::new();
        let err = gateway.remove_by_id("books", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delta_set_reports_changes_and_tombstones() {
        let gateway = MockGateway::new();
        gateway.insert("books", vec![Entity::with_id("a"), Entity::with_id("b")]);
        let since = gateway.find("books", None).await.unwrap().request_start.unwrap();

        gateway.delete("books", "a");
        gateway.insert("books", vec![Entity::with_id("b").with_field("v", json!(2))]);

        let delta = gateway
            .find_with_delta_set("books", None, &since)
            .await
            .unwrap();
        assert_eq!(delta.changed.len(), 1);
        assert_eq!(delta.changed[0].get("v"), Some(&json!(2)));
        assert_eq!(delta.deleted, vec![DeletedEntity { id: "a".into() }]);
        assert!(delta.request_start.unwrap() > since);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_once() {
        let gateway = MockGateway::new();
        gateway.fail_next(method::COUNT, GatewayError::server("boom"));
        assert!(gateway.count("books", None).await.is_err());
        assert_eq!(gateway.count("books", None).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn failing_creates_by_query() {
        let gateway = MockGateway::new();
        gateway.fail_creates_matching(Query::new().equal_to("title", json!("bad")));

        assert!(gateway
            .create("books", Entity::new().with_field("title", json!("bad")))
            .await
            .is_err());
        assert!(gateway
            .create("books", Entity::new().with_field("title", json!("good")))
            .await
            .is_ok());
    }
}
