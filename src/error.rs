//! Error types for range-bench operations.
//!
//! Every stage of a benchmark run reports through [`RangeBenchError`]:
//! decoding the binary inputs, talking to the store, and grading the results.
//! None of these are retried by the harness.

use std::io;
use thiserror::Error;

use crate::query::QueryDescriptor;
use crate::store::StoreError;

/// Result type alias using [`RangeBenchError`].
pub type Result<T> = std::result::Result<T, RangeBenchError>;

/// Errors that can occur while running a range-query benchmark.
#[derive(Error, Debug)]
pub enum RangeBenchError {
    /// A vector-batch or ground-truth file is malformed or truncated.
    #[error("format error: {0}")]
    Format(String),

    /// The store rejected or failed a query; the run is aborted.
    #[error("store execution failed at query {index} ({strategy}): {source}")]
    StoreExecution {
        /// Position of the failing query.
        index: usize,
        /// Strategy of the failing query, kept for the message.
        strategy: String,
        /// The descriptor that was being executed.
        descriptor: Box<QueryDescriptor>,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// Number of execution records differs from the ground-truth query count.
    #[error("alignment error: {records} execution records vs {queries} ground-truth queries")]
    Alignment {
        /// Number of execution records produced.
        records: usize,
        /// Number of queries in the ground truth.
        queries: usize,
    },

    /// An execution record sits at a position that does not match its index.
    #[error("record at position {position} carries query index {index}")]
    RecordOutOfOrder {
        /// Position of the record in the run.
        position: usize,
        /// Query index stored in the record.
        index: usize,
    },

    /// The run was cancelled between queries.
    #[error("run cancelled after {completed} queries")]
    Cancelled {
        /// Queries completed before cancellation was observed.
        completed: usize,
    },

    /// Acquiring or releasing the store session failed.
    #[error("store connection error: {0}")]
    StoreConnection(#[source] StoreError),

    /// Invalid parameter value provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid benchmark configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during serialization or deserialization of results.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Checksum verification failed while loading a result file.
    #[error("checksum mismatch: result file may be corrupted")]
    ChecksumMismatch,
}

impl RangeBenchError {
    /// Creates a new `Format` error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Creates a new `Alignment` error.
    pub fn alignment(records: usize, queries: usize) -> Self {
        Self::Alignment { records, queries }
    }

    /// Creates a new `StoreExecution` error for the given descriptor.
    pub fn store_execution(descriptor: &QueryDescriptor, source: StoreError) -> Self {
        Self::StoreExecution {
            index: descriptor.index,
            strategy: descriptor.strategy.to_string(),
            descriptor: Box::new(descriptor.clone()),
            source,
        }
    }

    /// Creates a new `InvalidParameter` error.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Creates a new `InvalidConfig` error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates a new `Serialization` error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Index of the failing query, if the error is tied to one.
    pub fn query_index(&self) -> Option<usize> {
        match self {
            Self::StoreExecution { index, .. } => Some(*index),
            Self::RecordOutOfOrder { position, .. } => Some(*position),
            _ => None,
        }
    }
}

impl From<bincode::Error> for RangeBenchError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for RangeBenchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
