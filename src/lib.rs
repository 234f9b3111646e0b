//! range-bench: recall and throughput harness for ANN range queries.
//!
//! This crate measures how well a vector store's approximate index answers
//! range predicates ("every stored vector within distance `r` of `q`") by
//! running each query twice, once through the index and once as an exhaustive
//! scan, and grading both against an externally computed ground truth.
//!
//! # Features
//!
//! - **Binary Codec**: little-endian vector batches and CSR ground truth
//! - **Query Generation**: parameterized index-scan and sequential-scan descriptors
//! - **Sequential Execution**: per-query latency over one scoped store session
//! - **Recall Evaluation**: macro-averaged recall, QPS and latency percentiles
//! - **Top-k Filtered Workload**: recall of a filtered top-k run against a baseline
//! - **Result Sink**: checksummed binary runs and JSON reports
//!
//! # Example
//!
//! ```
//! use range_bench::{BenchmarkConfig, Dataset, MemoryConnector, RangeBenchmark};
//!
//! let dataset = Dataset::generate(200, 10, 8, 1.2, 42).unwrap();
//! let config = BenchmarkConfig::default().with_progress_interval(0);
//! let bench = RangeBenchmark::new(config, MemoryConnector::new(dataset.base.clone()));
//!
//! let outcome = bench.run_with(&dataset.queries, &dataset.ground_truth).unwrap();
//! assert_eq!(outcome.index_scan.unwrap().aggregate_recall, 1.0);
//! ```

pub mod benchmark;
pub mod codec;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod evaluation;
pub mod executor;
pub mod metrics;
pub mod persistence;
pub mod query;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root
pub use benchmark::{RangeBenchmark, RangeBenchmarkOutcome};
pub use codec::{load_ground_truth, load_vector_batch, read_ground_truth, read_vector_batch};
pub use config::BenchmarkConfig;
pub use dataset::Dataset;
pub use distance::DistanceMetric;
pub use error::{RangeBenchError, Result};
pub use evaluation::{evaluate_topk, RecallEvaluator, RecallReport, TopKReport};
pub use executor::{CancelToken, ExecutionRecord, ExecutionRun, QueryExecutor};
pub use metrics::LatencyStats;
pub use persistence::Persistable;
pub use query::{IdFilter, QueryDescriptor, QueryGenerator, QueryKind, ScanStrategy, SqlTarget};
pub use store::{MemoryConnector, MemoryStore, QueryStore, StoreConnector, StoreError, StoreSession};
pub use types::{GroundTruth, IdOffset, VectorBatch};
