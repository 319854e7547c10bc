//! Stress tests for docsync.
//!
//! These tests verify behavior under heavy load and concurrent access.

use crate::fixtures::{sample_entities, TestClient};
use docsync_protocol::Entity;
use docsync_sync_engine::{DataStore, OfflineDataStore, SyncStore};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent tasks (for concurrent tests).
    pub tasks: usize,
    /// Number of distinct entities.
    pub entity_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            tasks: 4,
            entity_count: 1_000,
        }
    }
}

/// Creates entities from several tasks at once through one store.
pub async fn stress_concurrent_creates(store: &SyncStore, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_task = config.operations / config.tasks.max(1);

    let start = Instant::now();

    let handles: Vec<_> = (0..config.tasks)
        .map(|t| {
            let store = store.clone();
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);

            tokio::spawn(async move {
                for i in 0..ops_per_task {
                    let entity = Entity::new()
                        .with_field("task", json!(t))
                        .with_field("index", json!(i));
                    match store.create(entity).await {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.expect("Task panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Rewrites a fixed set of entities repeatedly, so queue entries keep
/// superseding each other.
pub async fn stress_repeated_updates(store: &SyncStore, config: &StressConfig) -> StressTestResult {
    let mut entities = Vec::with_capacity(config.entity_count);
    for entity in sample_entities(config.entity_count) {
        if let Ok(saved) = store.create(entity).await {
            entities.push(saved);
        }
    }

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let Some(entity) = entities.get_mut(i % config.entity_count.max(1)) else {
            failed += 1;
            continue;
        };
        entity.set("revision", json!(i));
        match store.update(entity.clone()).await {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Queues `operations` creates and drains them with a single push.
pub async fn stress_push_drain(client: &TestClient, config: &StressConfig) -> StressTestResult {
    let store = client.sync_store("stress_push");
    for entity in sample_entities(config.operations) {
        let _ = store.create(entity).await;
    }

    let start = Instant::now();
    match store.push(None).await {
        Ok(results) => {
            let failed = results.iter().filter(|r| !r.is_success()).count();
            StressTestResult::new(results.len() - failed, failed, start.elapsed())
        }
        Err(_) => StressTestResult::new(0, config.operations, start.elapsed()),
    }
}
