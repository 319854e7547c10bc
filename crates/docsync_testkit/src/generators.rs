//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random documents, queries and
//! sync operation sequences.

use docsync_protocol::{Entity, Query, SyncOperation};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for generating valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for generating valid tags.
pub fn tag_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9][a-zA-Z0-9-]{0,15}").expect("Invalid regex")
}

/// Strategy for generating entity ids.
pub fn entity_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-f0-9]{24}").expect("Invalid regex")
}

/// Strategy for generating scalar field values.
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(|n| json!(n)),
        any::<bool>().prop_map(|b| json!(b)),
        prop::string::string_regex("[a-z ]{0,12}")
            .expect("Invalid regex")
            .prop_map(|s| json!(s)),
        Just(Value::Null),
    ]
}

/// Strategy for generating entities without an `_id`.
pub fn new_entity_strategy() -> impl Strategy<Value = Entity> {
    prop::collection::btree_map("[a-z]{1,8}", field_value_strategy(), 0..6).prop_map(|fields| {
        fields
            .into_iter()
            .fold(Entity::new(), |entity, (key, value)| {
                entity.with_field(key, value)
            })
    })
}

/// Strategy for generating entities with an `_id`.
pub fn entity_strategy() -> impl Strategy<Value = Entity> {
    (entity_id_strategy(), new_entity_strategy()).prop_map(|(id, entity)| {
        let mut entity = entity;
        entity.id = Some(id);
        entity
    })
}

/// Strategy for generating queries over an integer `n` field.
pub fn query_strategy() -> impl Strategy<Value = Query> {
    (
        prop::option::of(-100i64..100),
        prop::option::of(-100i64..100),
        any::<bool>(),
        prop::option::of(0usize..10),
        prop::option::of(1usize..10),
    )
        .prop_map(|(min, max, ascending, skip, limit)| {
            let mut query = Query::new();
            if let Some(min) = min {
                query = query.greater_than_or_equal_to("n", json!(min));
            }
            if let Some(max) = max {
                query = query.less_than("n", json!(max));
            }
            query = if ascending {
                query.ascending("n")
            } else {
                query.descending("n")
            };
            if let Some(skip) = skip {
                query = query.skip(skip);
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            query
        })
}

/// Strategy for generating the operations a queue entry can hold.
pub fn sync_operation_strategy() -> impl Strategy<Value = SyncOperation> {
    prop_oneof![
        Just(SyncOperation::Create),
        Just(SyncOperation::Update),
        Just(SyncOperation::Delete),
    ]
}

/// A write a caller can make against a sync store.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Create a new entity.
    Create {
        /// Entity fields.
        entity: Entity,
    },
    /// Update the n-th entity created so far.
    Update {
        /// Index into the created entities.
        target: usize,
        /// Value written to the `n` field.
        n: i64,
    },
    /// Remove the n-th entity created so far.
    Remove {
        /// Index into the created entities.
        target: usize,
    },
}

/// Strategy for generating store operations.
pub fn store_operation_strategy() -> impl Strategy<Value = StoreOperation> {
    prop_oneof![
        3 => new_entity_strategy().prop_map(|entity| StoreOperation::Create { entity }),
        2 => (0usize..16, -100i64..100).prop_map(|(target, n)| StoreOperation::Update { target, n }),
        1 => (0usize..16).prop_map(|target| StoreOperation::Remove { target }),
    ]
}

/// Strategy for generating a sequence of store operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(store_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_core::validate_tag;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn tags_are_valid(tag in tag_strategy()) {
            prop_assert!(validate_tag(&tag).is_ok());
        }

        #[test]
        fn new_entities_have_no_id(entity in new_entity_strategy()) {
            prop_assert!(entity.id().is_none());
        }

        #[test]
        fn generated_queries_validate(query in query_strategy()) {
            prop_assert!(query.validate().is_ok());
        }

        #[test]
        fn query_window_bounds_result(query in query_strategy()) {
            let docs: Vec<Value> = (0..20).map(|n| json!({ "_id": n.to_string(), "n": n })).collect();
            let out = query.process(docs);
            if let Some(limit) = query.limit_count() {
                prop_assert!(out.len() <= limit);
            }
            prop_assert!(out.iter().all(|doc| query.matches(doc)));
        }
    }
}
