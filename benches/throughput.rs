//! Throughput Benchmark for notesrv
//!
//! This benchmark measures the note lifecycle on both store backends
//! under various workloads.

use chrono::{Duration as ChronoDuration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use notesrv::api::ApiHandler;
use notesrv::clock::ManualClock;
use notesrv::notes::NoteService;
use notesrv::storage::{MemoryStore, NoteStore, SqliteStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn memory_service() -> NoteService {
    NoteService::new(Arc::new(MemoryStore::new()))
}

fn sqlite_service(dir: &TempDir) -> NoteService {
    let store = SqliteStore::open(dir.path().join("bench.db"), 4).unwrap();
    store.ensure_schema().unwrap();
    NoteService::new(Arc::new(store))
}

/// Benchmark note creation
fn bench_create(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut group = c.benchmark_group("create");
    group.throughput(Throughput::Elements(1));

    let memory = memory_service();
    group.bench_function("memory_small", |b| {
        b.iter(|| black_box(memory.create_note(Some("title"), "small note", 0).unwrap()));
    });

    let body = "x".repeat(16 * 1024); // 16KB note
    group.bench_function("memory_large", |b| {
        b.iter(|| black_box(memory.create_note(None, &body, 3).unwrap()));
    });

    let sqlite = sqlite_service(&dir);
    group.bench_function("sqlite_small", |b| {
        b.iter(|| black_box(sqlite.create_note(Some("title"), "small note", 0).unwrap()));
    });

    group.finish();
}

/// Benchmark single-read notes: one create and one consuming fetch
fn bench_create_and_consume(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut group = c.benchmark_group("consume");
    group.throughput(Throughput::Elements(1));

    for (name, service) in [("memory", memory_service()), ("sqlite", sqlite_service(&dir))] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let uid = service.create_note(None, "read me once", 0).unwrap();
                black_box(service.fetch_note(&uid).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark repeated reads of timed notes, which do not consume them
fn bench_fetch_timed(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut group = c.benchmark_group("fetch_timed");
    group.throughput(Throughput::Elements(1));

    for (name, service) in [("memory", memory_service()), ("sqlite", sqlite_service(&dir))] {
        let uids: Vec<String> = (0..1_000)
            .map(|i| {
                service
                    .create_note(None, &format!("note {}", i), 5)
                    .unwrap()
            })
            .collect();

        group.bench_function(name, |b| {
            let mut i = 0usize;
            b.iter(|| {
                black_box(service.fetch_note(&uids[i % uids.len()]).unwrap());
                i += 1;
            });
        });

        group.bench_function(format!("{}_missing", name), |b| {
            b.iter(|| black_box(service.fetch_note("missing").is_err()));
        });
    }

    group.finish();
}

/// Benchmark pruning a store where half the notes have expired
fn bench_prune(c: &mut Criterion) {
    let mut group = c.benchmark_group("prune");

    group.bench_function("memory_10k", |b| {
        b.iter(|| {
            let clock = Arc::new(ManualClock::new(Utc::now()));
            let store = Arc::new(MemoryStore::new());
            let service = NoteService::with_clock(store.clone(), clock.clone());
            for i in 0..10_000 {
                let mode = if i % 2 == 0 { 1 } else { 0 };
                service.create_note(None, "n", mode).unwrap();
            }
            clock.advance(ChronoDuration::minutes(6));
            black_box(service.prune_expired().unwrap());
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_create_consume", |b| {
        b.iter(|| {
            let service = memory_service();
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let service = service.clone();
                    thread::spawn(move || {
                        for _ in 0..2_500 {
                            let uid = service.create_note(None, "value", 0).unwrap();
                            service.fetch_note(&uid).unwrap();
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

/// Benchmark the API handler, including JSON validation and the
/// blocking-pool hop
fn bench_api(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let handler = ApiHandler::new(memory_service());

    let mut group = c.benchmark_group("api");
    group.throughput(Throughput::Elements(1));

    group.bench_function("create_get", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let reply = handler.create(Some(json!({"note": "n", "title": "t"}))).await;
                let uid = reply.field("uid").unwrap().to_string();
                black_box(handler.get(Some(json!({ "uid": uid }))).await);
            });
        });
    });

    group.bench_function("rejected", |b| {
        b.iter(|| runtime.block_on(async { black_box(handler.create(Some(json!({}))).await) }));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_create,
    bench_create_and_consume,
    bench_fetch_timed,
    bench_prune,
    bench_concurrent,
    bench_api,
);

criterion_main!(benches);
