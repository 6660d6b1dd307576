//! Storage backend benchmarks.

use blobdb_bench::random_data;
use blobdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

/// Benchmark InMemoryBackend append operations.
fn bench_inmemory_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("inmemory_append");

    for size in [256, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut backend = InMemoryBackend::new();
            let data = random_data(size);

            b.iter(|| {
                let offset = backend.append(black_box(&data)).unwrap();
                black_box(offset);
            });
        });
    }

    group.finish();
}

/// Benchmark FileBackend append operations.
fn bench_file_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_append");
    group.sample_size(50);

    for size in [256, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let mut backend = FileBackend::create_new(&temp_dir.path().join("bench.blob")).unwrap();
            let data = random_data(size);

            b.iter(|| {
                let offset = backend.append(black_box(&data)).unwrap();
                black_box(offset);
            });
        });
    }

    group.finish();
}

/// Benchmark reads through a read-only FileBackend handle.
fn bench_file_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_read");
    group.sample_size(50);

    for size in [256, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let path = temp_dir.path().join("bench.blob");

            let mut writer = FileBackend::create_new(&path).unwrap();
            writer.append(&random_data(size)).unwrap();
            writer.sync().unwrap();

            let reader = FileBackend::open_read_only(&path).unwrap();

            b.iter(|| {
                let result = reader.read_at(black_box(0), black_box(size)).unwrap();
                black_box(result);
            });
        });
    }

    group.finish();
}

/// Benchmark FileBackend sync after a write.
fn bench_file_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_sync");
    group.sample_size(20); // Sync is slow

    let temp_dir = TempDir::new().unwrap();
    let mut backend = FileBackend::create_new(&temp_dir.path().join("bench.blob")).unwrap();
    let data = random_data(1024);

    group.bench_function("after_1kb_write", |b| {
        b.iter(|| {
            backend.append(&data).unwrap();
            backend.sync().unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_inmemory_append,
    bench_file_append,
    bench_file_read,
    bench_file_sync,
);

criterion_main!(benches);
