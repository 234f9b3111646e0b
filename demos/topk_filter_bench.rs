//! Filtered top-k benchmark: post-filtering versus an exact prefilter baseline.
//!
//! Both runs ask for the `TOPK` nearest rows with `id < CARDINALITY`. The
//! baseline filters before ranking; the post-filter path ranks a fixed
//! candidate list first and filters afterwards, so it can come back short.
//!
//! Run with: cargo run --release --example topk_filter_bench

use range_bench::dataset::synthetic_batch;
use range_bench::persistence::{load_run, save_run};
use range_bench::query::SqlTarget;
use range_bench::store::{MemoryStore, StoreError};
use range_bench::{
    evaluate_topk, IdFilter, QueryDescriptor, QueryExecutor, QueryGenerator, QueryKind,
    QueryStore, ScanStrategy,
};
use tracing_subscriber::EnvFilter;

const N_BASE: usize = 50_000;
const N_QUERIES: usize = 500;
const DIM: usize = 32;
const CARDINALITY: u64 = 5_000;
const TOPK: usize = 10;
/// Candidates ranked by the post-filter path before filtering.
const EF_SEARCH: usize = 40;

/// Answers sequential scans exactly and index scans by post-filtering.
struct PostFilterStore {
    exact: MemoryStore,
}

impl QueryStore for PostFilterStore {
    fn submit(&mut self, query: &QueryDescriptor) -> Result<Vec<u64>, StoreError> {
        match (query.strategy, query.kind) {
            (ScanStrategy::IndexScan, QueryKind::TopK { k, filter }) => {
                let candidates = self.exact.topk_search(query.vector(), EF_SEARCH.max(k), |_| true);
                Ok(candidates
                    .into_iter()
                    .filter(|id| filter.map_or(true, |f| f.matches(*id)))
                    .take(k)
                    .collect())
            }
            _ => self.exact.submit(query),
        }
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!(
        "Filtered top-{} benchmark: {} vectors, {} queries, id < {}\n",
        TOPK, N_BASE, N_QUERIES, CARDINALITY
    );

    let base = match synthetic_batch(N_BASE, DIM, 1) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error generating base vectors: {}", e);
            return;
        }
    };
    let queries = match synthetic_batch(N_QUERIES, DIM, 2) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Error generating queries: {}", e);
            return;
        }
    };

    let generator = QueryGenerator::new();
    let id_filter = Some(IdFilter::LessThan(CARDINALITY));
    let prefilter = generator.topk_queries(&queries, TOPK, id_filter, ScanStrategy::SequentialScan);
    let postfilter = generator.topk_queries(&queries, TOPK, id_filter, ScanStrategy::IndexScan);

    println!("Example statement: {}\n", postfilter[0].to_sql(&SqlTarget::default()).text);

    let mut store = PostFilterStore {
        exact: MemoryStore::new(base),
    };

    let results_dir = std::env::temp_dir().join("range-bench-topk-demo");
    if let Err(e) = std::fs::create_dir_all(&results_dir) {
        eprintln!("Error creating {}: {}", results_dir.display(), e);
        return;
    }

    for (name, descriptors) in [("prefilter", &prefilter), ("postfilter", &postfilter)] {
        let run = match QueryExecutor::new(&mut store).run(descriptors) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("{} run failed: {}", name, e);
                return;
            }
        };
        if let Err(e) = save_run(results_dir.join(format!("{name}.rbr")), &run) {
            eprintln!("Error saving {} run: {}", name, e);
            return;
        }
    }

    let (baseline, target) = match (
        load_run(results_dir.join("prefilter.rbr")),
        load_run(results_dir.join("postfilter.rbr")),
    ) {
        (Ok(b), Ok(t)) => (b, t),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error loading runs: {}", e);
            return;
        }
    };

    match evaluate_topk(&baseline, &target, TOPK) {
        Ok(report) => {
            println!("Prefilter latency:  {:.3} ms", report.baseline_latency.mean_ms);
            println!("Postfilter latency: {:.3} ms", report.target_latency.mean_ms);
            println!("Postfilter recall:  {:.2}%", report.recall * 100.0);
            println!("Short results:      {} / {}", report.short_results, report.query_count);
        }
        Err(e) => eprintln!("Evaluation failed: {}", e),
    }
}
