//! Benchmarks for RidgeKV storage operations

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::tempdir;

use ridgekv::{Config, Engine};

fn make_engine() -> (tempfile::TempDir, Engine) {
    let dir = tempdir().unwrap();
    let config = Config::builder()
        .data_dir(dir.path())
        // Large enough that a single benchmark iteration never triggers a flush.
        .memtable_size_limit(64 * 1024 * 1024)
        .build();
    let engine = Engine::open(config).unwrap();
    (dir, engine)
}

fn bench_put(c: &mut Criterion) {
    let (_dir, engine) = make_engine();
    let mut i: u64 = 0;

    c.bench_function("engine_put", |b| {
        b.iter(|| {
            i += 1;
            let key = format!("key-{i}");
            engine
                .put(black_box(key.as_bytes()), black_box(b"benchmark-value"))
                .unwrap();
        })
    });
}

fn bench_get_hit(c: &mut Criterion) {
    let (_dir, engine) = make_engine();
    for i in 0..10_000u32 {
        engine
            .put(format!("key-{i}").as_bytes(), b"benchmark-value")
            .unwrap();
    }

    c.bench_function("engine_get_memtable_hit", |b| {
        b.iter(|| {
            let value = engine.get(black_box(b"key-5000")).unwrap();
            black_box(value);
        })
    });
}

fn bench_get_after_flush(c: &mut Criterion) {
    let (_dir, engine) = make_engine();
    for i in 0..10_000u32 {
        engine
            .put(format!("key-{i}").as_bytes(), b"benchmark-value")
            .unwrap();
    }
    engine.flush().unwrap();

    c.bench_function("engine_get_sstable_hit", |b| {
        b.iter(|| {
            let value = engine.get(black_box(b"key-5000")).unwrap();
            black_box(value);
        })
    });
}

fn bench_sequential_write_throughput(c: &mut Criterion) {
    c.bench_function("engine_sequential_write_1000", |b| {
        b.iter_batched(
            make_engine,
            |(_dir, engine)| {
                for i in 0..1_000u32 {
                    engine
                        .put(format!("seq-{i:06}").as_bytes(), b"v")
                        .unwrap();
                }
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_mixed_workload(c: &mut Criterion) {
    let (_dir, engine) = make_engine();
    for i in 0..5_000u32 {
        engine
            .put(format!("mixed-{i}").as_bytes(), b"benchmark-value")
            .unwrap();
    }
    let mut i: u32 = 0;

    c.bench_function("engine_mixed_read_write", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            let key = format!("mixed-{}", i % 5_000);
            if i % 4 == 0 {
                engine.put(key.as_bytes(), b"updated-value").unwrap();
            } else {
                black_box(engine.get(key.as_bytes()).unwrap());
            }
        })
    });
}

fn bench_flush(c: &mut Criterion) {
    c.bench_function("engine_flush_10000_entries", |b| {
        b.iter_batched(
            || {
                let (dir, engine) = make_engine();
                for i in 0..10_000u32 {
                    engine
                        .put(format!("flush-{i}").as_bytes(), b"benchmark-value")
                        .unwrap();
                }
                (dir, engine)
            },
            |(_dir, engine)| engine.flush().unwrap(),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_put,
    bench_get_hit,
    bench_get_after_flush,
    bench_sequential_write_throughput,
    bench_mixed_workload,
    bench_flush,
);
criterion_main!(benches);


