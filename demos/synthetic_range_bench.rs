//! Range benchmark over synthetic data with a simulated approximate index.
//!
//! The index-scan path drops a fraction of each exact answer, so the report
//! shows index-scan recall below the sequential-scan baseline.
//!
//! Run with: cargo run --release --example synthetic_range_bench
//! Optionally pass a JSON config: `-- bench.json` (its query and ground-truth
//! files must describe vectors drawn from the same synthetic base).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use range_bench::store::{MemoryConnector, MemoryStore, StoreError};
use range_bench::{
    BenchmarkConfig, Dataset, QueryDescriptor, QueryStore, RangeBenchmark, ScanStrategy,
    SqlTarget, StoreConnector,
};
use tracing_subscriber::EnvFilter;

const N_BASE: usize = 20_000;
const N_QUERIES: usize = 200;
const DIM: usize = 32;
const THRESHOLD: f32 = 2.6;
const SEED: u64 = 42;

/// Exact store whose index path loses each result with probability `miss_rate`.
struct LossyIndexStore {
    exact: MemoryStore,
    miss_rate: f64,
    rng: StdRng,
}

impl QueryStore for LossyIndexStore {
    fn submit(&mut self, query: &QueryDescriptor) -> Result<Vec<u64>, StoreError> {
        let mut ids = self.exact.submit(query)?;
        if query.strategy == ScanStrategy::IndexScan {
            ids.retain(|_| !self.rng.gen_bool(self.miss_rate));
        }
        Ok(ids)
    }

    fn apply_setting(&mut self, name: &str, value: &str) -> Result<(), StoreError> {
        self.exact.apply_setting(name, value)
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.exact.close()
    }
}

struct LossyConnector {
    base: range_bench::VectorBatch,
    miss_rate: f64,
}

impl StoreConnector for LossyConnector {
    type Store = LossyIndexStore;

    fn connect(&self, target: &SqlTarget) -> Result<LossyIndexStore, StoreError> {
        Ok(LossyIndexStore {
            exact: MemoryConnector::new(self.base.clone()).connect(target)?,
            miss_rate: self.miss_rate,
            rng: StdRng::seed_from_u64(SEED),
        })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    println!(
        "Synthetic range benchmark: {} base vectors, {} queries, {} dims, threshold {}\n",
        N_BASE, N_QUERIES, DIM, THRESHOLD
    );

    let dataset = match Dataset::generate(N_BASE, N_QUERIES, DIM, THRESHOLD, SEED) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error generating dataset: {}", e);
            return;
        }
    };
    println!(
        "Ground truth: {} neighbors total ({:.1} per query)\n",
        dataset.ground_truth.total_neighbors(),
        dataset.ground_truth.total_neighbors() as f64 / N_QUERIES as f64
    );

    let connector = LossyConnector {
        base: dataset.base.clone(),
        miss_rate: 0.05,
    };

    let outcome = match std::env::args().nth(1) {
        Some(path) => {
            let config = match BenchmarkConfig::from_json_file(&path) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error loading config {}: {}", path, e);
                    return;
                }
            };
            RangeBenchmark::new(config, connector).run()
        }
        None => {
            let config = BenchmarkConfig::default()
                .with_session_setting("hnsw.ef_search", "40")
                .with_results_dir(std::env::temp_dir().join("range-bench-demo"));
            RangeBenchmark::new(config, connector)
                .run_with(&dataset.queries, &dataset.ground_truth)
        }
    };

    let outcome = match outcome {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Benchmark failed: {}", e);
            return;
        }
    };

    println!("{:>16} │ {:>8} │ {:>10} │ {:>10} │ {:>10}", "strategy", "recall", "QPS", "p50 ms", "p99 ms");
    println!("─────────────────┼──────────┼────────────┼────────────┼───────────");
    for strategy in ScanStrategy::ALL {
        if let Some(report) = outcome.report(strategy) {
            println!(
                "{:>16} │ {:>7.2}% │ {:>10.0} │ {:>10.3} │ {:>10.3}",
                strategy,
                report.aggregate_recall * 100.0,
                report.qps,
                report.latency.p50_ms,
                report.latency.p99_ms
            );
        }
    }
    println!();
}
