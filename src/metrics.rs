//! Latency and throughput statistics.
//!
//! Latencies are summarized per run with [`LatencyStats`]; throughput is
//! always computed from the run's wall-clock span via [`compute_qps`], never
//! from the sum of per-query latencies.
//!
//! ```
//! use std::time::Duration;
//! use range_bench::metrics::{compute_qps, LatencyStats};
//!
//! let stats = LatencyStats::from_durations([Duration::from_millis(2), Duration::from_millis(4)]);
//! assert_eq!(stats.count, 2);
//! assert!((stats.mean_ms - 3.0).abs() < 1e-9);
//! assert_eq!(compute_qps(100, Duration::from_secs(4)), 25.0);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Latency summary of one run, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Number of measurements.
    pub count: usize,
    /// Mean latency.
    pub mean_ms: f64,
    /// Median latency.
    pub p50_ms: f64,
    /// 95th percentile latency.
    pub p95_ms: f64,
    /// 99th percentile latency.
    pub p99_ms: f64,
    /// Fastest query.
    pub min_ms: f64,
    /// Slowest query.
    pub max_ms: f64,
}

impl LatencyStats {
    /// Summarize a set of latencies. An empty set yields all zeros.
    pub fn from_durations(latencies: impl IntoIterator<Item = Duration>) -> Self {
        let mut sorted: Vec<f64> = latencies
            .into_iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        if sorted.is_empty() {
            return Self::default();
        }
        sorted.sort_by(f64::total_cmp);

        let sum: f64 = sorted.iter().sum();
        Self {
            count: sorted.len(),
            mean_ms: sum / sorted.len() as f64,
            p50_ms: percentile(&sorted, 50.0),
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
        }
    }

    /// Format as a one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "mean={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
            self.mean_ms, self.p50_ms, self.p95_ms, self.p99_ms, self.max_ms
        )
    }
}

/// Nearest-rank percentile of values sorted ascending.
///
/// `p` is in `[0, 100]`; returns 0.0 for an empty slice.
pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    let idx = ((p / 100.0) * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}

/// Queries per second over a wall-clock span.
///
/// Returns 0.0 when no queries ran or the span is zero.
pub fn compute_qps(queries: usize, wall_clock: Duration) -> f64 {
    let secs = wall_clock.as_secs_f64();
    if queries == 0 || secs <= 0.0 {
        return 0.0;
    }
    queries as f64 / secs
}
