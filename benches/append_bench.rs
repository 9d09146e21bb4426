//! Benchmarks for commit log append and read throughput

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use commitlog::{CommitLog, Config};
use tempfile::TempDir;

fn open_log(dir: &TempDir) -> CommitLog {
    let config = Config::builder().background_compaction(false).build();
    CommitLog::open(dir.path(), config).unwrap()
}

fn append_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for size in [256usize, 512, 1024, 2048, 4096] {
        let payload = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            let dir = TempDir::new().unwrap();
            let log = open_log(&dir);
            b.iter(|| log.append(payload).unwrap());
        });
    }

    group.finish();
}

fn read_benchmarks(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let log = open_log(&dir);
    let payload = vec![1u8; 1024];
    for _ in 0..10_000 {
        log.append(&payload).unwrap();
    }

    let mut offset = 0u64;
    c.bench_function("read_sequential_1k", |b| {
        b.iter(|| {
            let record = log.read(offset).unwrap();
            offset = (offset + 1) % 10_000;
            record
        })
    });
}

criterion_group!(benches, append_benchmarks, read_benchmarks);
criterion_main!(benches);
