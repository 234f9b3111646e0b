//! Benchmarks for recall evaluation and exact ground-truth computation.
//!
//! Run with: cargo bench --bench evaluation_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use range_bench::dataset::compute_range_ground_truth;
use range_bench::{
    Dataset, MemoryStore, QueryExecutor, QueryGenerator, RecallEvaluator, ScanStrategy,
};

/// Benchmark grading a full run against its ground truth.
fn benchmark_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    for n_queries in [100, 1_000] {
        let dataset = Dataset::generate(5_000, n_queries, 32, 2.6, 42).unwrap();
        let mut store = MemoryStore::new(dataset.base.clone());
        let descriptors = QueryGenerator::new().range_queries(
            &dataset.queries,
            dataset.ground_truth.threshold(),
            ScanStrategy::IndexScan,
        );
        let run = QueryExecutor::new(&mut store)
            .with_progress_interval(0)
            .run(&descriptors)
            .unwrap();
        let evaluator = RecallEvaluator::new(&dataset.ground_truth);

        group.throughput(Throughput::Elements(n_queries as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n_queries), &run, |b, run| {
            b.iter(|| evaluator.evaluate(black_box(run)).unwrap())
        });
    }

    group.finish();
}

/// Benchmark the parallel exact range ground truth.
fn benchmark_ground_truth(c: &mut Criterion) {
    let dataset = Dataset::generate(20_000, 100, 64, 4.0, 7).unwrap();

    let mut group = c.benchmark_group("range_ground_truth");
    group.throughput(Throughput::Elements(dataset.queries.count() as u64));
    group.sample_size(20);

    group.bench_function("20k_base_100_queries", |b| {
        b.iter(|| {
            compute_range_ground_truth(
                black_box(&dataset.base),
                black_box(&dataset.queries),
                black_box(4.0),
            )
            .unwrap()
        })
    });

    group.finish();
}

/// Benchmark the in-memory store answering range queries through the executor.
fn benchmark_memory_store(c: &mut Criterion) {
    let dataset = Dataset::generate(10_000, 50, 128, 6.0, 3).unwrap();
    let descriptors = QueryGenerator::new().range_queries(
        &dataset.queries,
        6.0,
        ScanStrategy::SequentialScan,
    );
    let mut store = MemoryStore::new(dataset.base);

    let mut group = c.benchmark_group("memory_store");
    group.throughput(Throughput::Elements(descriptors.len() as u64));
    group.sample_size(20);

    group.bench_function("range_run_10k_x_128", |b| {
        b.iter(|| {
            QueryExecutor::new(&mut store)
                .with_progress_interval(0)
                .run(black_box(&descriptors))
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_evaluate,
    benchmark_ground_truth,
    benchmark_memory_store
);
criterion_main!(benches);
