//! Push and pull benchmarks against the in-memory mock server.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use docsync_bench::utils::{generate_entities, generate_server_entities, runtime};
use docsync_core::LocalStorage;
use docsync_sync_engine::{
    Client, DataStore, MockGateway, OfflineDataStore, PullOptions, StoreOptions, SyncConfig,
    SyncStore,
};
use std::sync::Arc;

fn setup(config: SyncConfig) -> (Arc<MockGateway>, SyncStore) {
    let gateway = Arc::new(MockGateway::new());
    let client = Client::new(LocalStorage::in_memory(), gateway.clone(), config).unwrap();
    let store = client.sync_store("books", StoreOptions::new()).unwrap();
    (gateway, store)
}

/// Benchmark draining a queue of offline creates.
fn bench_push(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("push_creates");
    group.sample_size(20);

    for count in [10, 100, 500].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_batched(
                || {
                    let (_, store) = setup(SyncConfig::default());
                    rt.block_on(async {
                        for entity in generate_entities(count, 64) {
                            store.create(entity).await.unwrap();
                        }
                    });
                    store
                },
                |store| black_box(rt.block_on(store.push(None)).unwrap()),
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

/// Benchmark full and auto-paginated pulls.
fn bench_pull(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("pull");
    group.sample_size(20);

    let count = 2000;
    group.throughput(Throughput::Elements(count as u64));
    for (name, options) in [
        ("full", PullOptions::new()),
        ("paginated_500", PullOptions::new().with_auto_pagination(500)),
    ] {
        group.bench_function(name, |b| {
            let (gateway, store) = setup(SyncConfig::default());
            gateway.insert("books", generate_server_entities(count, 64));

            b.iter(|| black_box(rt.block_on(store.pull(None, Some(&options))).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark a delta-set pull after a small server-side change.
fn bench_delta_pull(c: &mut Criterion) {
    let rt = runtime();
    let (gateway, store) = setup(SyncConfig::default().with_delta_set(true));
    gateway.insert("books", generate_server_entities(2000, 64));
    rt.block_on(store.pull(None, None)).unwrap();

    c.bench_function("pull_delta_set", |b| {
        b.iter(|| {
            gateway.insert("books", generate_server_entities(5, 64));
            black_box(rt.block_on(store.pull(None, None)).unwrap())
        });
    });
}

criterion_group!(benches, bench_push, bench_pull, bench_delta_pull);
criterion_main!(benches);
