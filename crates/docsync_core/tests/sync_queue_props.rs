//! Property tests for sync queue uniqueness.

use docsync_core::{LocalStorage, SyncQueue};
use docsync_protocol::{Entity, SyncOperation};
use proptest::prelude::*;
use std::collections::HashMap;

fn operation_strategy() -> impl Strategy<Value = SyncOperation> {
    prop_oneof![
        Just(SyncOperation::Create),
        Just(SyncOperation::Update),
        Just(SyncOperation::Delete),
    ]
}

fn run<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn one_entry_per_entity_reflecting_last_operation(
        events in prop::collection::vec((0usize..5, operation_strategy()), 1..40)
    ) {
        let (entries, expected) = run(async {
            let storage = LocalStorage::in_memory();
            let queue = SyncQueue::new(&storage, None).unwrap();
            let mut expected = HashMap::new();

            for (n, op) in &events {
                let id = format!("e{n}");
                queue
                    .add_sync_event("books", op.clone(), &[Entity::with_id(&id)])
                    .await
                    .unwrap();
                expected.insert(id, op.clone());
            }
            (queue.find(None).await.unwrap(), expected)
        });

        prop_assert_eq!(entries.len(), expected.len());
        for entry in entries {
            prop_assert_eq!(Some(entry.operation()), expected.get(&entry.entity_id));
        }
    }

    #[test]
    fn local_entities_never_queue_deletes(count in 1usize..10) {
        let queued = run(async {
            let storage = LocalStorage::in_memory();
            let queue = SyncQueue::new(&storage, None).unwrap();
            let entities: Vec<Entity> = (0..count)
                .map(|i| {
                    let mut e = Entity::with_id(format!("L{i}"));
                    e.mark_local();
                    e
                })
                .collect();
            queue
                .add_sync_event("books", SyncOperation::Create, &entities)
                .await
                .unwrap();
            queue
                .add_sync_event("books", SyncOperation::Delete, &entities)
                .await
                .unwrap();
            queue.count(None).await.unwrap()
        });
        prop_assert_eq!(queued, 0);
    }
}
