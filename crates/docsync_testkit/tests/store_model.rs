//! Random write sequences against a sync store, checked after one push.

use docsync_protocol::Entity;
use docsync_sync_engine::{DataStore, OfflineDataStore};
use docsync_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::json;

fn run<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn push_converges_local_and_server(ops in operation_sequence_strategy(1, 30)) {
        init_tracing();
        let (live, cached, server, pending, any_local) = run(async {
            let client = TestClient::memory();
            let store = client.sync_store("books");
            let mut created: Vec<Option<Entity>> = Vec::new();

            for op in &ops {
                match op {
                    StoreOperation::Create { entity } => {
                        created.push(Some(store.create(entity.clone()).await.unwrap()));
                    }
                    StoreOperation::Update { target, n } => {
                        if let Some(Some(entity)) = created.get_mut(*target) {
                            entity.set("n", json!(n));
                            *entity = store.update(entity.clone()).await.unwrap();
                        }
                    }
                    StoreOperation::Remove { target } => {
                        if let Some(slot) = created.get_mut(*target) {
                            if let Some(entity) = slot.take() {
                                store.remove_by_id(entity.id().unwrap()).await.unwrap();
                            }
                        }
                    }
                }
            }

            let results = store.push(None).await.unwrap();
            assert!(results.iter().all(|r| r.is_success()));

            let cached = store.find(None).await.unwrap();
            (
                created.iter().flatten().count(),
                cached.len(),
                client.gateway.entities("books").len(),
                store.pending_sync_count(None).await.unwrap(),
                cached.iter().any(Entity::is_local),
            )
        });

        prop_assert_eq!(cached, live);
        prop_assert_eq!(server, live);
        prop_assert_eq!(pending, 0);
        prop_assert!(!any_local);
    }
}
