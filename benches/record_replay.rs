//! Benchmarks for record-replay performance

use std::sync::Arc;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use http::Request;
use tempfile::TempDir;

use reqtape::{recorder, DirStore, FixtureStore, Mode, RecorderOptions, StaticTransport, Transport};

const RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ntest";

fn get(path: &str) -> Request<Bytes> {
    Request::builder()
        .uri(format!("http://example.com{path}"))
        .body(Bytes::new())
        .unwrap()
}

fn bench_record_single_request(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("record_single_request", |b| {
        b.iter(|| {
            rt.block_on(async {
                let temp_dir = TempDir::new().unwrap();
                let record = recorder(
                    Mode::Record,
                    Some(Arc::new(StaticTransport::new(RESPONSE))),
                    Arc::new(DirStore::new(temp_dir.path())),
                    RecorderOptions::default(),
                );

                black_box(record.round_trip(get("/api/test")).await.unwrap());
            });
        });
    });
}

fn bench_replay_single_request(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    // Setup: record a single request
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn FixtureStore> = Arc::new(DirStore::new(temp_dir.path()));
    rt.block_on(async {
        let record = recorder(
            Mode::Record,
            Some(Arc::new(StaticTransport::new(RESPONSE))),
            Arc::clone(&store),
            RecorderOptions::default(),
        );
        record.round_trip(get("/api/test")).await.unwrap();
    });

    let replay = recorder(Mode::Replay, None, store, RecorderOptions::default());

    c.bench_function("replay_single_request", |b| {
        b.iter(|| {
            let response = rt
                .block_on(replay.round_trip(black_box(get("/api/test"))))
                .unwrap();
            black_box(response);
        });
    });
}

fn bench_cache_hits(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    // Setup: fill the cache with 100 fixtures
    let temp_dir = TempDir::new().unwrap();
    let cache = recorder(
        Mode::Cache,
        Some(Arc::new(StaticTransport::new(RESPONSE))),
        Arc::new(DirStore::new(temp_dir.path())),
        RecorderOptions::default(),
    );
    rt.block_on(async {
        for i in 0..100 {
            cache.round_trip(get(&format!("/api/test/{i}"))).await.unwrap();
        }
    });

    c.bench_function("cache_hit_100_fixtures", |b| {
        b.iter(|| {
            let response = rt
                .block_on(cache.round_trip(black_box(get("/api/test/50"))))
                .unwrap();
            black_box(response);
        });
    });
}

criterion_group!(
    benches,
    bench_record_single_request,
    bench_replay_single_request,
    bench_cache_hits
);
criterion_main!(benches);
