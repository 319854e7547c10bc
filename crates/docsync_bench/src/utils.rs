//! Benchmark utilities.

use docsync_protocol::Entity;
use rand::Rng;
use serde_json::{json, Value};

/// Generate a random lowercase string of the specified length.
pub fn random_text(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// Generate entities without ids, each with a `body` of `payload_size` bytes
/// and a random `rank` in `0..1000`.
pub fn generate_entities(count: usize, payload_size: usize) -> Vec<Entity> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            Entity::new()
                .with_field("index", json!(i))
                .with_field("rank", json!(rng.gen_range(0..1000)))
                .with_field("body", json!(random_text(payload_size)))
        })
        .collect()
}

/// Generate entities with server-style ids.
pub fn generate_server_entities(count: usize, payload_size: usize) -> Vec<Entity> {
    generate_entities(count, payload_size)
        .into_iter()
        .enumerate()
        .map(|(i, mut entity)| {
            entity.id = Some(format!("srv-{i:06}"));
            entity
        })
        .collect()
}

/// Generate raw documents as stored by the local backend.
pub fn generate_documents(count: usize) -> Vec<Value> {
    generate_server_entities(count, 16)
        .iter()
        .filter_map(|entity| entity.to_value().ok())
        .collect()
}

/// Build a single-threaded runtime for driving async code from criterion.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}
