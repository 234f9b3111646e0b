//! Query descriptors and their generation.
//!
//! A [`QueryDescriptor`] is the logical query: which vector, which predicate,
//! which execution strategy. It says nothing about wire encoding. Stores that
//! speak SQL render it with [`QueryDescriptor::to_sql`], which keeps the
//! vector and threshold as typed parameters instead of splicing their text
//! into the statement.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::sync::Arc;

use crate::constants::sql::{
    DEFAULT_ID_COLUMN, DEFAULT_TABLE, DEFAULT_VECTOR_COLUMN, L2_OPERATOR, RANGE_FUNCTION,
};
use crate::types::VectorBatch;

/// How the store is expected to answer a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStrategy {
    /// Answered through the store's accelerated ANN index.
    IndexScan,
    /// Answered by an exhaustive scan with no index usage.
    SequentialScan,
}

impl ScanStrategy {
    /// Both strategies, sequential scan first (the order runs are issued in).
    pub const ALL: [ScanStrategy; 2] = [ScanStrategy::SequentialScan, ScanStrategy::IndexScan];

    /// Short lowercase name, used in file names and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStrategy::IndexScan => "index-scan",
            ScanStrategy::SequentialScan => "sequential-scan",
        }
    }
}

impl fmt::Display for ScanStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restriction on candidate identifiers for filtered top-k queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdFilter {
    /// Only ids strictly below the bound qualify.
    LessThan(u64),
}

impl IdFilter {
    /// True if `id` passes the filter.
    #[inline]
    pub fn matches(&self, id: u64) -> bool {
        match *self {
            IdFilter::LessThan(bound) => id < bound,
        }
    }
}

/// The predicate a query evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Every stored item within `threshold` (L2) of the query vector.
    Range {
        /// Distance threshold, kept as the same `f32` the ground truth stores.
        threshold: f32,
    },
    /// The `k` nearest stored items, optionally restricted by id.
    TopK {
        /// Number of neighbors requested.
        k: usize,
        /// Optional id restriction applied before ranking.
        filter: Option<IdFilter>,
    },
}

/// One query, ready to be submitted exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    /// Position of the originating vector in the query batch.
    pub index: usize,
    /// Intended execution strategy.
    pub strategy: ScanStrategy,
    /// Predicate to evaluate.
    pub kind: QueryKind,
    vector: Arc<[f32]>,
}

impl QueryDescriptor {
    /// The query vector.
    #[inline]
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// The range threshold, if this is a range query.
    pub fn threshold(&self) -> Option<f32> {
        match self.kind {
            QueryKind::Range { threshold } => Some(threshold),
            QueryKind::TopK { .. } => None,
        }
    }

    /// Render as a parameterized SQL statement against `target`.
    ///
    /// `$1` is always the query vector. Range queries bind the threshold as
    /// `$2`; top-k queries bind `k` as `$2` and the filter bound as `$3`.
    /// Integers are bound as `bigint`: `k` saturates at `i64::MAX`, and a
    /// filter bound above `i64::MAX` admits every id, so it is left out.
    pub fn to_sql(&self, target: &SqlTarget) -> SqlStatement {
        let SqlTarget {
            table,
            id_column,
            vector_column,
        } = target;
        let vector = SqlParam::Vector(Arc::clone(&self.vector));

        match self.kind {
            QueryKind::Range { threshold } => {
                let text = match self.strategy {
                    ScanStrategy::IndexScan => format!(
                        "SELECT {id_column} FROM {table} WHERE {RANGE_FUNCTION}({vector_column}, $1, $2)"
                    ),
                    ScanStrategy::SequentialScan => format!(
                        "SELECT {id_column} FROM {table} WHERE {vector_column} {L2_OPERATOR} $1 < $2"
                    ),
                };
                SqlStatement {
                    text,
                    params: vec![vector, SqlParam::Float(threshold)],
                }
            }
            QueryKind::TopK { k, filter } => {
                let mut text = format!("SELECT {id_column} FROM {table}");
                let limit = i64::try_from(k).unwrap_or(i64::MAX);
                let mut params = vec![vector, SqlParam::Int(limit)];
                let bound = filter.and_then(|IdFilter::LessThan(bound)| i64::try_from(bound).ok());
                if let Some(bound) = bound {
                    let _ = write!(text, " WHERE {id_column} < $3");
                    params.push(SqlParam::Int(bound));
                }
                let _ = write!(
                    text,
                    " ORDER BY {vector_column} {L2_OPERATOR} $1 LIMIT $2"
                );
                SqlStatement { text, params }
            }
        }
    }
}

/// Table and columns a SQL statement targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlTarget {
    /// Table holding the vectors.
    pub table: String,
    /// Identifier column returned by queries.
    pub id_column: String,
    /// Vector column compared against the query.
    pub vector_column: String,
}

impl Default for SqlTarget {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            vector_column: DEFAULT_VECTOR_COLUMN.to_string(),
        }
    }
}

impl SqlTarget {
    /// Target the given table with default column names.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// A query vector.
    Vector(Arc<[f32]>),
    /// A single-precision float, e.g. a range threshold.
    Float(f32),
    /// An integer, e.g. a limit or id bound.
    Int(i64),
}

/// SQL text with positional (`$n`) parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// Statement text.
    pub text: String,
    /// Parameters in `$1, $2, ...` order.
    pub params: Vec<SqlParam>,
}

/// Render a vector as pgvector text, e.g. `[1,2.5,-0.125]`.
///
/// Uses shortest round-trip float formatting, so parsing the text back as
/// `f32` yields the identical bits.
pub fn vector_literal(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 8 + 2);
    out.push('[');
    for (i, value) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{value}");
    }
    out.push(']');
    out
}

/// Builds query descriptors from query vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryGenerator;

impl QueryGenerator {
    /// Create a generator.
    pub fn new() -> Self {
        Self
    }

    /// Range descriptor for one vector and strategy.
    pub fn range(
        &self,
        index: usize,
        vector: impl Into<Arc<[f32]>>,
        threshold: f32,
        strategy: ScanStrategy,
    ) -> QueryDescriptor {
        QueryDescriptor {
            index,
            strategy,
            kind: QueryKind::Range { threshold },
            vector: vector.into(),
        }
    }

    /// Index-scan and sequential-scan descriptors for the same vector and threshold.
    ///
    /// Both share one vector allocation and the identical threshold bits.
    pub fn range_pair(
        &self,
        index: usize,
        vector: impl Into<Arc<[f32]>>,
        threshold: f32,
    ) -> (QueryDescriptor, QueryDescriptor) {
        let vector: Arc<[f32]> = vector.into();
        let index_scan = self.range(index, Arc::clone(&vector), threshold, ScanStrategy::IndexScan);
        let seq_scan = self.range(index, vector, threshold, ScanStrategy::SequentialScan);
        (index_scan, seq_scan)
    }

    /// Range descriptors for every vector of a batch, in batch order.
    pub fn range_queries(
        &self,
        batch: &VectorBatch,
        threshold: f32,
        strategy: ScanStrategy,
    ) -> Vec<QueryDescriptor> {
        batch
            .iter()
            .enumerate()
            .map(|(i, v)| self.range(i, v, threshold, strategy))
            .collect()
    }

    /// Top-k descriptors for every vector of a batch, in batch order.
    pub fn topk_queries(
        &self,
        batch: &VectorBatch,
        k: usize,
        filter: Option<IdFilter>,
        strategy: ScanStrategy,
    ) -> Vec<QueryDescriptor> {
        batch
            .iter()
            .enumerate()
            .map(|(i, v)| QueryDescriptor {
                index: i,
                strategy,
                kind: QueryKind::TopK { k, filter },
                vector: v.into(),
            })
            .collect()
    }
}
