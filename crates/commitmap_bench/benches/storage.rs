//! Storage backend and table benchmarks.

use commitmap_core::{summarize, PersistentEnumerator, RawKeyDescriptor};
use commitmap_storage::{FileBackend, InMemoryBackend, StorageBackend};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::Rng;
use tempfile::TempDir;

fn random_keys(count: usize, len: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| (0..len).map(|_| rng.gen()).collect())
        .collect()
}

/// Benchmark buffered appends against direct in-memory appends.
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    group.sample_size(20);
    let data = vec![0x5au8; 32];
    group.throughput(Throughput::Bytes(32 * 1_000));

    group.bench_function("inmemory_1000x32", |b| {
        b.iter(|| {
            let mut backend = InMemoryBackend::new();
            for _ in 0..1_000 {
                backend.append(black_box(&data)).unwrap();
            }
            black_box(backend.size().unwrap());
        });
    });

    group.bench_function("file_1000x32", |b| {
        b.iter(|| {
            let dir = TempDir::new().unwrap();
            let mut backend = FileBackend::open(&dir.path().join("bench.dat")).unwrap();
            for _ in 0..1_000 {
                backend.append(black_box(&data)).unwrap();
            }
            backend.flush().unwrap();
            black_box(backend.size().unwrap());
        });
    });

    group.finish();
}

/// Benchmark the generic table with raw keys.
fn bench_enumerate(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerate");
    let keys = random_keys(1_000, 24);
    group.throughput(Throughput::Elements(keys.len() as u64));

    group.bench_function("raw_1000", |b| {
        b.iter(|| {
            let table =
                PersistentEnumerator::open(Box::new(InMemoryBackend::new()), RawKeyDescriptor, 1)
                    .unwrap();
            for key in &keys {
                black_box(table.enumerate(key).unwrap());
            }
        });
    });

    group.finish();
}

/// Benchmark the read-only integrity walk.
fn bench_summarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarize");
    let backend = InMemoryBackend::new();
    {
        let table =
            PersistentEnumerator::open(Box::new(backend.clone()), RawKeyDescriptor, 1).unwrap();
        for key in &random_keys(10_000, 24) {
            table.enumerate(key).unwrap();
        }
    }

    group.bench_function("10000_records", |b| {
        b.iter(|| black_box(summarize(&backend, None).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_append, bench_enumerate, bench_summarize);
criterion_main!(benches);
