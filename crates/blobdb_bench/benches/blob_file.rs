//! Blob file benchmarks.

use blobdb_bench::generate_records;
use blobdb_core::{
    BlobFile, BlobFileOptions, BlobRecord, FileNumber, RandomAccessReader, SequenceNumber,
};
use blobdb_storage::{MemoryEnv, OsEnv};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

/// Benchmark appending records to an open blob file.
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("blob_append");

    for size in [256, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let control = BlobFile::create(
                FileNumber::new(1),
                "bench",
                Arc::new(MemoryEnv::new()),
                BlobFileOptions::default(),
            )
            .unwrap();
            let record = generate_records(1, size, false).remove(0);

            b.iter(|| {
                let offset = control.append(black_box(&record)).unwrap();
                black_box(offset);
            });
        });
    }

    group.finish();
}

/// Benchmark bookkeeping alone, without touching storage.
fn bench_record_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_append");

    group.bench_function("ttl", |b| {
        let control = BlobFile::create(
            FileNumber::new(1),
            "bench",
            Arc::new(MemoryEnv::new()),
            BlobFileOptions::new().has_ttl(true),
        )
        .unwrap();
        let mut seq = 0u64;

        b.iter(|| {
            seq += 1;
            control
                .record_append(black_box(128), SequenceNumber::new(seq), Some(seq ^ 0x55))
                .unwrap();
        });
    });

    group.finish();
}

/// Benchmark filling and finalizing a file on disk.
fn bench_fill_and_finalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_and_finalize");
    group.sample_size(20);

    let records = generate_records(1000, 1024, true);
    group.bench_function("file_1000x1kb", |b| {
        let temp_dir = TempDir::new().unwrap();
        let env = Arc::new(OsEnv::new());
        let next = AtomicU64::new(1);

        b.iter(|| {
            let number = FileNumber::new(next.fetch_add(1, Ordering::Relaxed));
            let control = BlobFile::create(
                number,
                temp_dir.path(),
                env.clone(),
                BlobFileOptions::new().has_ttl(true),
            )
            .unwrap();
            for record in &records {
                control.append(record).unwrap();
            }
            control.finalize().unwrap();
            black_box(control.file_size());
        });
    });

    group.finish();
}

fn filled_file(count: usize, size: usize) -> (Arc<BlobFile>, Vec<u64>) {
    let control = BlobFile::create(
        FileNumber::new(1),
        "bench",
        Arc::new(MemoryEnv::new()),
        BlobFileOptions::default(),
    )
    .unwrap();
    let offsets = generate_records(count, size, false)
        .iter()
        .map(|record| control.append(record).unwrap())
        .collect();
    control.finalize().unwrap();
    (control.shared(), offsets)
}

/// Benchmark point lookups through the cached reader.
fn bench_point_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_lookup");

    let (file, offsets) = filled_file(1000, 256);
    group.bench_function("cached_reader_1000_records", |b| {
        let mut idx = 0;
        b.iter(|| {
            let (reader, _) = file.get_or_open_reader().unwrap();
            let record = read(&reader, offsets[(idx * 7) % offsets.len()]);
            idx += 1;
            black_box(record);
        });
    });

    group.bench_function("state_checks", |b| {
        b.iter(|| {
            black_box(file.visible_to_snapshot(black_box(SequenceNumber::new(500))));
            black_box(file.blob_count());
            black_box(file.is_obsolete());
        });
    });

    group.finish();
}

fn read(reader: &RandomAccessReader, offset: u64) -> BlobRecord {
    reader.read_record(offset).unwrap()
}

/// Benchmark reader lookups from several threads at once.
fn bench_concurrent_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_lookup");
    group.sample_size(20);

    let (file, offsets) = filled_file(1000, 256);
    let offsets = Arc::new(offsets);
    for threads in [2, 4, 8].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(threads), threads, |b, &threads| {
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let file = Arc::clone(&file);
                        let offsets = Arc::clone(&offsets);
                        thread::spawn(move || {
                            for i in 0..100 {
                                let (reader, _) = file.get_or_open_reader().unwrap();
                                black_box(read(&reader, offsets[(t * 31 + i) % offsets.len()]));
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

/// Benchmark a sequential scan, as GC does.
fn bench_sequential_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_scan");
    group.sample_size(20);

    let (file, offsets) = filled_file(5000, 512);
    group.throughput(Throughput::Elements(offsets.len() as u64));
    group.bench_function("5000x512", |b| {
        b.iter(|| {
            let count = file
                .open_sequential_reader()
                .unwrap()
                .map(|r| r.unwrap())
                .count();
            black_box(count);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_append,
    bench_record_append,
    bench_fill_and_finalize,
    bench_point_lookup,
    bench_concurrent_lookup,
    bench_sequential_scan,
);

criterion_main!(benches);
