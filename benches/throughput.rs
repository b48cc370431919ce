//! Throughput Benchmark for polykv
//!
//! Measures the storage engine, the command layer and the RESP parser
//! under a few representative workloads.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use polykv::commands::{Command, CommandHandler};
use polykv::protocol::{decode_command, parse_frame};
use polykv::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine.set(Bytes::from(format!("key:{}", i)), Bytes::from("small_value"));
            i += 1;
        });
    });

    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine.set_with_ttl(
                Bytes::from(format!("ttl:{}", i)),
                Bytes::from("value"),
                Duration::from_secs(3600),
            );
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark EXISTS, single and multi-key
fn bench_exists(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());
    for i in 0..100_000 {
        engine.set(Bytes::from(format!("key:{}", i)), Bytes::from("v"));
    }

    let mut group = c.benchmark_group("exists");

    group.throughput(Throughput::Elements(1));
    group.bench_function("exists_hit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.exists(format!("key:{}", i % 100_000).as_bytes()));
            i += 1;
        });
    });

    let keys: Vec<Bytes> = (0..8).map(|i| Bytes::from(format!("key:{}", i * 7))).collect();
    group.throughput(Throughput::Elements(keys.len() as u64));
    group.bench_function("exists_many_8", |b| {
        b.iter(|| black_box(engine.exists_many(&keys)));
    });

    group.finish();
}

/// Benchmark hash operations
fn bench_hash(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("hash");
    group.throughput(Throughput::Elements(1));

    group.bench_function("hset_new_fields", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("h:{}", i % 1_000));
            engine.hset(key, vec![(Bytes::from(format!("f:{}", i)), Bytes::from("v"))]);
            i += 1;
        });
    });

    let wide = Bytes::from("wide");
    let pairs = (0..100)
        .map(|i| (Bytes::from(format!("field:{}", i)), Bytes::from("v")))
        .collect();
    engine.hset(wide.clone(), pairs);

    group.bench_function("hkeys_100_fields", |b| {
        b.iter(|| black_box(engine.hkeys(&wide).unwrap()));
    });

    group.finish();
}

/// Benchmark INCR on a single hot counter
fn bench_incr(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("incr");
    group.throughput(Throughput::Elements(1));

    group.bench_function("single_counter", |b| {
        b.iter(|| black_box(engine.incr_by(b"counter", 1).unwrap()));
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let engine = Arc::new(StorageEngine::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            engine.set(key.clone(), Bytes::from("value"));
                            engine.exists(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(engine.len());
        });
    });

    group.finish();
}

/// Benchmark the full RESP request path: parse, decode, execute
fn bench_command_path(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
    let request = b"*4\r\n$4\r\nHSET\r\n$6\r\nuser:1\r\n$4\r\nname\r\n$3\r\nada\r\n";

    let mut group = c.benchmark_group("command");
    group.throughput(Throughput::Elements(1));

    group.bench_function("resp_hset", |b| {
        b.iter(|| {
            let (frame, _) = parse_frame(request).unwrap().unwrap();
            let command = decode_command(frame).unwrap().unwrap();
            black_box(handler.execute(command));
        });
    });

    group.bench_function("execute_exists", |b| {
        b.iter(|| {
            let command = Command::new("EXISTS").with_args(["user:1", "user:2"]);
            black_box(handler.execute(command));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_exists,
    bench_hash,
    bench_incr,
    bench_concurrent,
    bench_command_path,
);

criterion_main!(benches);
