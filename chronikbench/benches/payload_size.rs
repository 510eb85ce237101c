use async_trait::async_trait;
use chronikbench::core::client::{DnsRecord, GeoResponse, RECORD_TYPE_A};
use chronikbench::{GeoLocator, LookupError, NameResolver, ResolutionCache, payload};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::{Value, json};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

/// Resolver that answers every name with the same address
struct StaticResolver;

#[async_trait]
impl NameResolver for StaticResolver {
    async fn lookup(&self, _name: &str) -> Result<Vec<DnsRecord>, LookupError> {
        Ok(vec![DnsRecord::new(RECORD_TYPE_A, "203.0.113.1")])
    }
}

struct StaticLocator;

#[async_trait]
impl GeoLocator for StaticLocator {
    async fn locate(&self, ip: &str) -> Result<GeoResponse, LookupError> {
        Ok(GeoResponse {
            status: "success".to_string(),
            country: Some("Germany".to_string()),
            city: Some("Nuremberg".to_string()),
            query: Some(ip.to_string()),
            message: None,
        })
    }

    async fn locate_self(&self) -> Result<GeoResponse, LookupError> {
        self.locate("198.51.100.1").await
    }
}

fn history_page(records: usize) -> Value {
    let txs: Vec<Value> = (0..records)
        .map(|i| {
            json!({
                "txid": format!("{i:064x}"),
                "version": 2,
                "inputs": [{"prevOut": {"txid": format!("{:064x}", i + 1), "outIdx": 0}, "sats": 5_000_000u64}],
                "outputs": [
                    {"sats": 18_446_744_073_709_551_615u64, "outputScript": "76a914deadbeef88ac"},
                    {"sats": 546, "outputScript": "6a04534c5000"},
                ],
                "block": {"height": 900_000 - i as i64, "timestamp": 1_730_000_000i64},
                "size": 219,
            })
        })
        .collect();
    json!({ "txs": txs, "numPages": 5, "numTxs": 1_000 })
}

fn benchmark_serialized_len(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialized_len");
    group.measurement_time(Duration::from_secs(10));

    for records in [10, 200, 600] {
        let page = history_page(records);
        group.throughput(Throughput::Elements(records as u64));
        group.bench_with_input(BenchmarkId::from_parameter(records), &page, |b, page| {
            b.iter(|| black_box(payload::serialized_len(black_box(page)).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_render_pretty(c: &mut Criterion) {
    let page = history_page(200);

    c.bench_function("render_pretty_200", |b| {
        b.iter(|| black_box(payload::render_pretty(black_box(&page)).unwrap()));
    });
}

fn benchmark_cache_hits(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = Arc::new(ResolutionCache::new(
        Arc::new(StaticResolver),
        Arc::new(StaticLocator),
    ));

    // Warm both maps so the loop only measures hits
    rt.block_on(async {
        let ip = cache.resolve("chronik.e.cash").await.unwrap();
        cache.locate(&ip).await;
    });

    let mut group = c.benchmark_group("resolution_cache");
    group.throughput(Throughput::Elements(1));

    group.bench_function("resolve_hit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(cache.resolve(black_box("chronik.e.cash")).await) });
    });

    group.bench_function("locate_hit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(cache.locate(black_box("203.0.113.1")).await) });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_serialized_len,
    benchmark_render_pretty,
    benchmark_cache_hits
);
criterion_main!(benches);
