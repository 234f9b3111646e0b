//! Benchmark run configuration.
//!
//! A [`BenchmarkConfig`] is a plain value: build it with `with_*` methods or
//! load it from JSON. Missing JSON fields take their [`Default`] values.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::constants::executor::PROGRESS_INTERVAL;
use crate::error::{RangeBenchError, Result};
use crate::query::{ScanStrategy, SqlTarget};
use crate::types::IdOffset;

/// Session setting applied before any query so index scans keep walking the
/// graph until the range predicate is exhausted.
pub const DEFAULT_SESSION_SETTING: (&str, &str) = ("hnsw.iterative_scan", "relaxed_order");

/// Configuration of one range benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Vector-batch file holding the query vectors.
    pub query_path: PathBuf,
    /// CSR ground-truth file aligned with the query vectors.
    pub ground_truth_path: PathBuf,
    /// Table and columns the store connection is opened for.
    pub target: SqlTarget,
    /// Strategies to run, in order.
    pub strategies: Vec<ScanStrategy>,
    /// `(name, value)` settings applied once after connecting.
    pub session_settings: Vec<(String, String)>,
    /// Shift from ground-truth ids to store ids.
    pub id_offset: IdOffset,
    /// Log progress every this many queries (0 disables).
    pub progress_interval: usize,
    /// Keep per-query recall values in the reports.
    pub per_query_recall: bool,
    /// Directory receiving raw runs and the JSON outcome, if any.
    pub results_dir: Option<PathBuf>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        let (name, value) = DEFAULT_SESSION_SETTING;
        Self {
            query_path: PathBuf::new(),
            ground_truth_path: PathBuf::new(),
            target: SqlTarget::default(),
            strategies: ScanStrategy::ALL.to_vec(),
            session_settings: vec![(name.to_string(), value.to_string())],
            id_offset: IdOffset::default(),
            progress_interval: PROGRESS_INTERVAL,
            per_query_recall: false,
            results_dir: None,
        }
    }
}

impl BenchmarkConfig {
    /// Configuration for the given query and ground-truth files.
    pub fn new(query_path: impl Into<PathBuf>, ground_truth_path: impl Into<PathBuf>) -> Self {
        Self {
            query_path: query_path.into(),
            ground_truth_path: ground_truth_path.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|e| RangeBenchError::invalid_config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        debug!(path = %path.display(), "loaded benchmark config");
        Ok(config)
    }

    /// Set the SQL target.
    pub fn with_target(mut self, target: SqlTarget) -> Self {
        self.target = target;
        self
    }

    /// Restrict the run to `strategies`, in the given order.
    pub fn with_strategies(mut self, strategies: impl IntoIterator<Item = ScanStrategy>) -> Self {
        self.strategies = strategies.into_iter().collect();
        self
    }

    /// Append a session setting.
    pub fn with_session_setting(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.session_settings.push((name.into(), value.into()));
        self
    }

    /// Drop all session settings, including the default one.
    pub fn without_session_settings(mut self) -> Self {
        self.session_settings.clear();
        self
    }

    /// Set the id offset.
    pub fn with_id_offset(mut self, id_offset: IdOffset) -> Self {
        self.id_offset = id_offset;
        self
    }

    /// Set the progress logging interval.
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Keep per-query recall in reports.
    pub fn with_per_query_recall(mut self, keep: bool) -> Self {
        self.per_query_recall = keep;
        self
    }

    /// Write results into `dir`.
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = Some(dir.into());
        self
    }

    /// Check the configuration for values that can never run.
    pub fn validate(&self) -> Result<()> {
        if self.query_path.as_os_str().is_empty() {
            return Err(RangeBenchError::invalid_config("query_path is empty"));
        }
        if self.ground_truth_path.as_os_str().is_empty() {
            return Err(RangeBenchError::invalid_config("ground_truth_path is empty"));
        }
        self.validate_execution()
    }

    /// Check everything except the input paths, for runs over data already
    /// in memory.
    pub fn validate_execution(&self) -> Result<()> {
        if self.strategies.is_empty() {
            return Err(RangeBenchError::invalid_config("no strategies selected"));
        }

        let mut seen = HashSet::new();
        for strategy in &self.strategies {
            if !seen.insert(*strategy) {
                return Err(RangeBenchError::invalid_config(format!(
                    "strategy {strategy} listed twice"
                )));
            }
        }

        for (name, _) in &self.session_settings {
            if name.trim().is_empty() {
                return Err(RangeBenchError::invalid_config("session setting with empty name"));
            }
        }

        let target = &self.target;
        for (field, value) in [
            ("table", &target.table),
            ("id_column", &target.id_column),
            ("vector_column", &target.vector_column),
        ] {
            if value.trim().is_empty() {
                return Err(RangeBenchError::invalid_config(format!("{field} is empty")));
            }
        }

        Ok(())
    }
}
