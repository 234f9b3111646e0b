//! Sequential query execution with per-query latency.
//!
//! The executor submits descriptors one at a time, in the order given, and
//! blocks on each store call. It never retries, deduplicates or reorders, so
//! `records[i].index` always equals the `i`-th descriptor's index.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::constants::executor::PROGRESS_INTERVAL;
use crate::error::{RangeBenchError, Result};
use crate::query::{QueryDescriptor, ScanStrategy};
use crate::store::QueryStore;

/// Outcome of one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Index of the originating query.
    pub index: usize,
    /// Strategy the query was issued with.
    pub strategy: ScanStrategy,
    /// Wall-clock time of the store call.
    pub latency: Duration,
    /// Identifiers returned by the store, in store order.
    pub result_ids: Vec<u64>,
}

/// All records of one sequential run plus its wall-clock span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRun {
    /// Strategy shared by the run's queries.
    pub strategy: ScanStrategy,
    /// Records in issue order.
    pub records: Vec<ExecutionRecord>,
    /// Span from the first submit to the last return, including overhead
    /// between queries.
    pub wall_clock: Duration,
}

impl ExecutionRun {
    /// Number of queries executed.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the run holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Per-query latencies in issue order.
    pub fn latencies(&self) -> impl Iterator<Item = Duration> + '_ {
        self.records.iter().map(|r| r.latency)
    }

    /// Sum of per-query latencies (excludes inter-query overhead).
    pub fn total_latency(&self) -> Duration {
        self.latencies().sum()
    }
}

/// Cooperative cancellation flag, checked between queries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the current query still completes.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Submits descriptors to a store and records what came back.
pub struct QueryExecutor<'s, S: QueryStore> {
    store: &'s mut S,
    cancel: Option<CancelToken>,
    progress_interval: usize,
}

impl<'s, S: QueryStore> QueryExecutor<'s, S> {
    /// Create an executor over a connected store.
    pub fn new(store: &'s mut S) -> Self {
        Self {
            store,
            cancel: None,
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    /// Honor `token` between queries.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Log progress every `interval` queries (0 disables progress logging).
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Execute one descriptor and time the store call.
    ///
    /// # Errors
    /// Returns `StoreExecution` carrying the descriptor if the store fails.
    pub fn execute(&mut self, descriptor: &QueryDescriptor) -> Result<ExecutionRecord> {
        let start = Instant::now();
        let result = self.store.submit(descriptor);
        let latency = start.elapsed();

        let result_ids =
            result.map_err(|source| RangeBenchError::store_execution(descriptor, source))?;

        Ok(ExecutionRecord {
            index: descriptor.index,
            strategy: descriptor.strategy,
            latency,
            result_ids,
        })
    }

    /// Execute all descriptors in order.
    ///
    /// The run's strategy is taken from the first descriptor (index scan for
    /// an empty list). Any failure or cancellation aborts the run and drops
    /// the records collected so far.
    pub fn run(&mut self, descriptors: &[QueryDescriptor]) -> Result<ExecutionRun> {
        let strategy = descriptors
            .first()
            .map_or(ScanStrategy::IndexScan, |d| d.strategy);
        if let Some(d) = descriptors.iter().find(|d| d.strategy != strategy) {
            return Err(RangeBenchError::invalid_parameter(format!(
                "query {} uses {} in a {} run",
                d.index, d.strategy, strategy
            )));
        }

        info!(%strategy, queries = descriptors.len(), "starting run");
        let mut records = Vec::with_capacity(descriptors.len());
        let start = Instant::now();

        for (i, descriptor) in descriptors.iter().enumerate() {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(RangeBenchError::Cancelled { completed: i });
            }
            records.push(self.execute(descriptor)?);
            if self.progress_interval > 0 && i % self.progress_interval == 0 {
                debug!(%strategy, completed = i + 1, total = descriptors.len(), "progress");
            }
        }

        let wall_clock = start.elapsed();
        info!(
            %strategy,
            queries = records.len(),
            wall_clock_ms = wall_clock.as_secs_f64() * 1000.0,
            "run finished"
        );

        Ok(ExecutionRun {
            strategy,
            records,
            wall_clock,
        })
    }
}
