//! sleet benchmark suite.
//!
//! Benchmarks for key operations:
//! - Row decoding throughput
//! - Chunk ingestion (decode, assemble and encode)
//! - Chunk planning

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};


use sleet::csv::{ArityPolicy, Dialect, Header, RowDecoder};
use sleet::source::plan_chunks;
use sleet::ChunkIngester;

fn decode_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in [1000, 10000, 100000] {
        let data = bench_utils::generate_rows(size);
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_with_input(BenchmarkId::new("rows", size), &data, |b, data| {
            b.iter(|| {
                RowDecoder::new(data.as_bytes(), Dialect::default())
                    .records()
                    .map(|row| row.unwrap())
                    .count()
            });
        });
    }

    group.finish();
}

/// Full chunk ingestion into an in-memory buffer.
fn ingest_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");
    let header = Header::parse(bench_utils::HEADER.as_bytes(), &Dialect::default()).unwrap();
    let ingester = ChunkIngester::new(header, Dialect::default(), ArityPolicy::Lenient);

    for size in [1000, 10000, 100000] {
        let data = bench_utils::generate_rows(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("ndjson", size), &data, |b, data| {
            let mut out = Vec::with_capacity(data.len() * 2);
            b.iter(|| {
                out.clear();
                ingester.ingest_bytes(data.as_bytes(), &mut out).unwrap()
            });
        });
    }

    group.finish();
}

fn chunk_planning_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_chunks");
    let data = bench_utils::generate_source(200_000);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for chunk_size in [64 * 1024, 1024 * 1024, 8 * 1024 * 1024] {
        group.bench_with_input(
            BenchmarkId::new("chunk_size", chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| plan_chunks(&data, 0, chunk_size, &Dialect::default()).len());
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    decode_benchmarks,
    ingest_benchmarks,
    chunk_planning_benchmarks
);
criterion_main!(benches);
