//! End-to-end range benchmark: load inputs, run each strategy, grade runs.
//!
//! One store session serves the whole benchmark. Strategies run in the
//! configured order (sequential scan first by default), each as its own
//! sequential [`ExecutionRun`], and every run is graded against the same
//! ground truth.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use tracing::info;

use crate::codec::{load_ground_truth, load_vector_batch};
use crate::config::BenchmarkConfig;
use crate::error::{RangeBenchError, Result};
use crate::evaluation::{RecallEvaluator, RecallReport};
use crate::executor::{CancelToken, ExecutionRun, QueryExecutor};
use crate::persistence::{save_report_json, save_run};
use crate::query::{QueryGenerator, ScanStrategy};
use crate::store::{StoreConnector, StoreSession};
use crate::types::{GroundTruth, VectorBatch};

/// File name of the JSON outcome inside the results directory.
pub const OUTCOME_FILE: &str = "outcome.json";

/// Graded reports of one benchmark, one per strategy that ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBenchmarkOutcome {
    /// Range threshold taken from the ground truth.
    pub threshold: f32,
    /// Number of queries per run.
    pub query_count: usize,
    /// Report of the sequential-scan run, if it ran.
    pub sequential_scan: Option<RecallReport>,
    /// Report of the index-scan run, if it ran.
    pub index_scan: Option<RecallReport>,
}

impl RangeBenchmarkOutcome {
    /// The report for `strategy`, if it ran.
    pub fn report(&self, strategy: ScanStrategy) -> Option<&RecallReport> {
        match strategy {
            ScanStrategy::SequentialScan => self.sequential_scan.as_ref(),
            ScanStrategy::IndexScan => self.index_scan.as_ref(),
        }
    }

    fn set_report(&mut self, report: RecallReport) {
        match report.strategy {
            ScanStrategy::SequentialScan => self.sequential_scan = Some(report),
            ScanStrategy::IndexScan => self.index_scan = Some(report),
        }
    }

    /// Multi-line summary, one line per report.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "range benchmark: {} queries, threshold {}",
            self.query_count, self.threshold
        )];
        lines.extend(
            ScanStrategy::ALL
                .iter()
                .filter_map(|s| self.report(*s))
                .map(|r| format!("  {}", r.summary())),
        );
        lines.join("\n")
    }
}

/// Runs a range benchmark against stores produced by a connector.
pub struct RangeBenchmark<C: StoreConnector> {
    config: BenchmarkConfig,
    connector: C,
    cancel: Option<CancelToken>,
}

impl<C: StoreConnector> RangeBenchmark<C> {
    /// Create a benchmark over `connector`.
    pub fn new(config: BenchmarkConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            cancel: None,
        }
    }

    /// Honor `token` between queries of every run.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Load the configured query and ground-truth files and run.
    ///
    /// # Errors
    /// `InvalidConfig` for an unusable configuration, `Format` for malformed
    /// inputs, plus everything [`run_with`](Self::run_with) returns.
    pub fn run(&self) -> Result<RangeBenchmarkOutcome> {
        self.config.validate()?;
        let queries = load_vector_batch(&self.config.query_path, true)?;
        let ground_truth = load_ground_truth(&self.config.ground_truth_path)?;
        self.run_with(&queries, &ground_truth)
    }

    /// Run every configured strategy over in-memory inputs.
    ///
    /// # Errors
    /// `Alignment` when the batch and ground truth disagree on the query
    /// count, `StoreConnection` when the session cannot be opened or closed,
    /// `StoreExecution` or `Cancelled` when a run aborts. The session is
    /// closed on every path.
    pub fn run_with(
        &self,
        queries: &VectorBatch,
        ground_truth: &GroundTruth,
    ) -> Result<RangeBenchmarkOutcome> {
        self.config.validate_execution()?;
        if queries.count() != ground_truth.query_count() {
            return Err(RangeBenchError::alignment(
                queries.count(),
                ground_truth.query_count(),
            ));
        }

        let threshold = ground_truth.threshold();
        info!(
            queries = queries.count(),
            dimension = queries.dimension(),
            threshold,
            strategies = ?self.config.strategies,
            "starting range benchmark"
        );

        let runs = self.execute_strategies(queries, threshold)?;

        let evaluator = RecallEvaluator::new(ground_truth)
            .with_id_offset(self.config.id_offset)
            .with_per_query_recall(self.config.per_query_recall);

        let mut outcome = RangeBenchmarkOutcome {
            threshold,
            query_count: queries.count(),
            sequential_scan: None,
            index_scan: None,
        };
        for run in &runs {
            outcome.set_report(evaluator.evaluate(run)?);
        }

        if let Some(dir) = &self.config.results_dir {
            write_results(dir, &runs, &outcome)?;
        }

        Ok(outcome)
    }

    fn execute_strategies(&self, queries: &VectorBatch, threshold: f32) -> Result<Vec<ExecutionRun>> {
        let generator = QueryGenerator::new();
        let mut session = StoreSession::open(
            &self.connector,
            &self.config.target,
            &self.config.session_settings,
        )?;
        let mut runs = Vec::with_capacity(self.config.strategies.len());

        for &strategy in &self.config.strategies {
            let descriptors = generator.range_queries(queries, threshold, strategy);
            let mut executor = QueryExecutor::new(session.store_mut())
                .with_progress_interval(self.config.progress_interval);
            if let Some(token) = &self.cancel {
                executor = executor.with_cancel_token(token.clone());
            }
            let mut run = executor.run(&descriptors)?;
            run.strategy = strategy;
            runs.push(run);
        }

        session.finish()?;
        Ok(runs)
    }
}

/// Write each run as `<strategy>.rbr` and the outcome as [`OUTCOME_FILE`].
fn write_results(dir: &Path, runs: &[ExecutionRun], outcome: &RangeBenchmarkOutcome) -> Result<()> {
    fs::create_dir_all(dir)?;
    for run in runs {
        save_run(dir.join(format!("{}.rbr", run.strategy)), run)?;
    }
    save_report_json(dir.join(OUTCOME_FILE), outcome)?;
    info!(dir = %dir.display(), "wrote benchmark results");
    Ok(())
}
