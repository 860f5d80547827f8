//! Benchmarks for the per-request governance hot paths.

use coda_client::cache::ResponseCache;
use coda_client::client::CallDescriptor;
use coda_client::observability::{DefaultMetricsCollector, MetricsCollector};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

fn bench_cache(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    // tokio's clock needs a runtime context.
    let _guard = runtime.enter();

    let cache: ResponseCache<String> = ResponseCache::new(Duration::from_secs(300));
    for i in 0..1_000 {
        cache.set(format!("GET docs/d{}", i), format!("value-{}", i));
    }

    c.bench_function("cache_get_hit", |b| {
        b.iter(|| cache.get(black_box("GET docs/d500")))
    });
    c.bench_function("cache_get_miss", |b| {
        b.iter(|| cache.get(black_box("GET docs/none")))
    });
    c.bench_function("cache_set", |b| {
        b.iter(|| cache.set(black_box("GET docs/d1"), "updated".to_string()))
    });
}

fn bench_metrics(c: &mut Criterion) {
    let metrics = DefaultMetricsCollector::new();

    c.bench_function("metrics_record_request", |b| {
        b.iter(|| metrics.record_request(black_box(Duration::from_millis(42)), true, false))
    });
    c.bench_function("metrics_detailed", |b| b.iter(|| metrics.detailed()));
}

fn bench_cache_key(c: &mut Criterion) {
    let descriptor = CallDescriptor::get(["docs", "d1", "tables", "t1", "rows"])
        .query_param("useColumnNames", "true")
        .query_param("limit", "100")
        .query_param("query", "Email:\"ada@example.com\"");

    c.bench_function("descriptor_cache_key", |b| b.iter(|| descriptor.cache_key()));
}

criterion_group!(benches, bench_cache, bench_metrics, bench_cache_key);
criterion_main!(benches);
