//! Recall evaluation against range-search ground truth.
//!
//! | Metric | Definition |
//! |--------|------------|
//! | recall_i | \|{g in GT_i : g + offset returned}\| / \|GT_i\|, or 1.0 if GT_i is empty |
//! | aggregate recall | mean of recall_i over all queries (macro-average) |
//! | QPS | queries / wall-clock span of the run |
//!
//! Grading refuses to run on misaligned inputs: a record count that differs
//! from the ground-truth query count, or a record whose index does not match
//! its position, is an error rather than a low recall number.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use tracing::info;

use crate::error::{RangeBenchError, Result};
use crate::executor::{ExecutionRecord, ExecutionRun};
use crate::metrics::{compute_qps, LatencyStats};
use crate::query::ScanStrategy;
use crate::types::{GroundTruth, IdOffset};

/// Recall and throughput of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallReport {
    /// Strategy of the graded run.
    pub strategy: ScanStrategy,
    /// Number of graded queries.
    pub query_count: usize,
    /// Macro-averaged recall in `[0, 1]`.
    pub aggregate_recall: f64,
    /// Queries per second over the run's wall-clock span.
    pub qps: f64,
    /// Wall-clock span of the run.
    pub wall_clock: Duration,
    /// Per-query latency summary.
    pub latency: LatencyStats,
    /// Recall of each query, when requested.
    #[serde(default)]
    pub per_query_recall: Option<Vec<f64>>,
}

impl RecallReport {
    /// Format as a one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{}: recall={:.4}, qps={:.1}, queries={}, {}",
            self.strategy,
            self.aggregate_recall,
            self.qps,
            self.query_count,
            self.latency.summary()
        )
    }
}

/// Grades execution runs against a range ground truth.
#[derive(Debug, Clone)]
pub struct RecallEvaluator<'a> {
    ground_truth: &'a GroundTruth,
    id_offset: IdOffset,
    keep_per_query: bool,
}

impl<'a> RecallEvaluator<'a> {
    /// Create an evaluator using the default store id offset of +1.
    pub fn new(ground_truth: &'a GroundTruth) -> Self {
        Self {
            ground_truth,
            id_offset: IdOffset::default(),
            keep_per_query: false,
        }
    }

    /// Set the shift from ground-truth ids to store ids.
    pub fn with_id_offset(mut self, id_offset: IdOffset) -> Self {
        self.id_offset = id_offset;
        self
    }

    /// Keep per-query recall values in reports.
    pub fn with_per_query_recall(mut self, keep: bool) -> Self {
        self.keep_per_query = keep;
        self
    }

    /// Recall of query `i` given the identifiers the store returned.
    ///
    /// The expected neighbors are treated as a set; result order and
    /// duplicates do not matter.
    ///
    /// # Panics
    /// Panics if `i >= ground_truth.query_count()`.
    pub fn query_recall(&self, i: usize, result_ids: &[u64]) -> f64 {
        let expected: HashSet<u32> = self.ground_truth.neighbors(i).iter().copied().collect();
        if expected.is_empty() {
            return 1.0;
        }
        let returned: HashSet<u64> = result_ids.iter().copied().collect();
        let hit = expected
            .iter()
            .filter(|&&gt_id| {
                self.id_offset
                    .to_store_id(gt_id)
                    .is_some_and(|id| returned.contains(&id))
            })
            .count();
        hit as f64 / expected.len() as f64
    }

    /// Verify that `records` lines up one-to-one with the ground-truth queries.
    pub fn check_alignment(&self, records: &[ExecutionRecord]) -> Result<()> {
        if records.len() != self.ground_truth.query_count() {
            return Err(RangeBenchError::alignment(
                records.len(),
                self.ground_truth.query_count(),
            ));
        }
        check_record_order(records)
    }

    /// Recall of every query in `records`, after checking alignment.
    pub fn recall_values(&self, records: &[ExecutionRecord]) -> Result<Vec<f64>> {
        self.check_alignment(records)?;
        Ok(records
            .iter()
            .map(|r| self.query_recall(r.index, &r.result_ids))
            .collect())
    }

    /// Grade a run: aggregate recall, QPS and latency statistics.
    pub fn evaluate(&self, run: &ExecutionRun) -> Result<RecallReport> {
        let recalls = self.recall_values(&run.records)?;
        let aggregate_recall = mean_or_one(&recalls);
        let report = RecallReport {
            strategy: run.strategy,
            query_count: recalls.len(),
            aggregate_recall,
            qps: compute_qps(run.len(), run.wall_clock),
            wall_clock: run.wall_clock,
            latency: LatencyStats::from_durations(run.latencies()),
            per_query_recall: self.keep_per_query.then_some(recalls),
        };
        info!(
            strategy = %report.strategy,
            recall = report.aggregate_recall,
            qps = report.qps,
            "evaluated run"
        );
        Ok(report)
    }
}

/// Comparison of a top-k run against a baseline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKReport {
    /// Number of neighbors requested.
    pub k: usize,
    /// Number of compared queries.
    pub query_count: usize,
    /// Baseline neighbors found by the target, over all baseline neighbors.
    pub recall: f64,
    /// Target queries that returned fewer than `k` identifiers.
    pub short_results: usize,
    /// Target throughput over its wall-clock span.
    pub qps: f64,
    /// Latency of the baseline run.
    pub baseline_latency: LatencyStats,
    /// Latency of the target run.
    pub target_latency: LatencyStats,
}

impl TopKReport {
    /// Format as a one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "top-{}: recall={:.4}, short={}, qps={:.1}, baseline mean={:.3}ms, target mean={:.3}ms",
            self.k,
            self.recall,
            self.short_results,
            self.qps,
            self.baseline_latency.mean_ms,
            self.target_latency.mean_ms
        )
    }
}

/// Grade a top-k run against a baseline run over the same queries.
///
/// Both runs use the same identifier space, so no offset is applied. For
/// each query the first `k` baseline ids count as relevant; a hit is a
/// relevant id anywhere in the target's result.
pub fn evaluate_topk(baseline: &ExecutionRun, target: &ExecutionRun, k: usize) -> Result<TopKReport> {
    if k == 0 {
        return Err(RangeBenchError::invalid_parameter("k must be positive"));
    }
    if baseline.len() != target.len() {
        return Err(RangeBenchError::alignment(target.len(), baseline.len()));
    }
    check_record_order(&baseline.records)?;
    check_record_order(&target.records)?;

    let mut hits = 0usize;
    let mut relevant = 0usize;
    let mut short_results = 0usize;

    for (expected, actual) in baseline.records.iter().zip(&target.records) {
        if actual.result_ids.len() < k {
            short_results += 1;
        }
        let returned: HashSet<u64> = actual.result_ids.iter().copied().collect();
        for id in expected.result_ids.iter().take(k) {
            relevant += 1;
            if returned.contains(id) {
                hits += 1;
            }
        }
    }

    let recall = if relevant == 0 {
        1.0
    } else {
        hits as f64 / relevant as f64
    };

    Ok(TopKReport {
        k,
        query_count: target.len(),
        recall,
        short_results,
        qps: compute_qps(target.len(), target.wall_clock),
        baseline_latency: LatencyStats::from_durations(baseline.latencies()),
        target_latency: LatencyStats::from_durations(target.latencies()),
    })
}

fn check_record_order(records: &[ExecutionRecord]) -> Result<()> {
    match records.iter().enumerate().find(|(i, r)| r.index != *i) {
        Some((position, record)) => Err(RangeBenchError::RecordOutOfOrder {
            position,
            index: record.index,
        }),
        None => Ok(()),
    }
}

/// Mean of `values`; an empty set has nothing to miss and scores 1.0.
fn mean_or_one(values: &[f64]) -> f64 {
    if values.is_empty() {
        1.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
