//! Store execution interface and scoped sessions.
//!
//! The harness never talks to a database directly. It drives a
//! [`QueryStore`] obtained from a [`StoreConnector`], wrapped in a
//! [`StoreSession`] that releases the connection on every exit path.
//!
//! [`MemoryStore`] answers queries exactly over an in-process vector batch.
//! It is the reference store for tests, demos and benches.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::distance::DistanceMetric;
use crate::error::{RangeBenchError, Result};
use crate::query::{QueryDescriptor, QueryKind, SqlTarget};
use crate::types::VectorBatch;

/// Category of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The connection could not be established or was lost.
    Connection,
    /// The store rejected the query or setting.
    Rejected,
    /// Anything else.
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreErrorKind::Connection => "connection",
            StoreErrorKind::Rejected => "rejected",
            StoreErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// A failed store call. Distinct from an empty, successful answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct StoreError {
    /// Failure category.
    pub kind: StoreErrorKind,
    /// Store-provided detail.
    pub message: String,
}

impl StoreError {
    /// Creates a new error of the given kind.
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a `Connection` error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Connection, message)
    }

    /// Creates a `Rejected` error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Rejected, message)
    }
}

/// A connected store that answers one query per synchronous call.
///
/// Retry and timeout policy belong to implementations, not to the harness.
pub trait QueryStore {
    /// Execute one query and return the identifiers it produced, in store order.
    ///
    /// An empty vector is a valid answer; failures must be reported as errors.
    fn submit(&mut self, query: &QueryDescriptor) -> std::result::Result<Vec<u64>, StoreError>;

    /// Apply a session-level setting (e.g. `hnsw.ef_search = 40`).
    fn apply_setting(&mut self, name: &str, value: &str) -> std::result::Result<(), StoreError> {
        let _ = (name, value);
        Ok(())
    }

    /// Release the connection. Called exactly once by [`StoreSession`].
    fn close(&mut self) -> std::result::Result<(), StoreError> {
        Ok(())
    }
}

impl<S: QueryStore + ?Sized> QueryStore for &mut S {
    fn submit(&mut self, query: &QueryDescriptor) -> std::result::Result<Vec<u64>, StoreError> {
        (**self).submit(query)
    }

    fn apply_setting(&mut self, name: &str, value: &str) -> std::result::Result<(), StoreError> {
        (**self).apply_setting(name, value)
    }

    fn close(&mut self) -> std::result::Result<(), StoreError> {
        (**self).close()
    }
}

/// Factory for store connections; one connection is opened per benchmark run.
pub trait StoreConnector {
    /// The connected store type.
    type Store: QueryStore;

    /// Open a new connection whose queries address `target`.
    fn connect(&self, target: &SqlTarget) -> std::result::Result<Self::Store, StoreError>;
}

/// A connected store that is closed when the session ends.
///
/// Dropping the session closes the store and logs close failures; call
/// [`finish`](Self::finish) to observe them instead.
pub struct StoreSession<S: QueryStore> {
    store: S,
    closed: bool,
}

impl<S: QueryStore> StoreSession<S> {
    /// Wrap an already connected store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            closed: false,
        }
    }

    /// Connect through `connector` to `target` and apply session settings in order.
    ///
    /// If a setting is rejected the fresh connection is closed before the
    /// error is returned.
    pub fn open<C>(connector: &C, target: &SqlTarget, settings: &[(String, String)]) -> Result<Self>
    where
        C: StoreConnector<Store = S>,
    {
        debug!(table = %target.table, "opening store session");
        let store = connector
            .connect(target)
            .map_err(RangeBenchError::StoreConnection)?;
        let mut session = Self::new(store);
        for (name, value) in settings {
            debug!(name = %name, value = %value, "applying session setting");
            session
                .store
                .apply_setting(name, value)
                .map_err(RangeBenchError::StoreConnection)?;
        }
        Ok(session)
    }

    /// The connected store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Close the store, reporting any close failure.
    pub fn finish(mut self) -> Result<()> {
        self.closed = true;
        self.store.close().map_err(RangeBenchError::StoreConnection)
    }
}

impl<S: QueryStore> Drop for StoreSession<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.store.close() {
            warn!(error = %err, "failed to close store session");
        }
    }
}

/// A candidate with its distance, ordered by distance for the top-k heap.
#[derive(Clone, Copy)]
struct Scored {
    id: u64,
    distance: f32,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        // max-heap on distance: peek() is the current worst candidate
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
    }
}

/// Exact in-process store over a vector batch.
///
/// Row `i` of the batch is returned as identifier `i + id_base`; the default
/// base of 1 mirrors a serial primary key. Both scan strategies are answered
/// by a full scan, so their results are identical.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    base: VectorBatch,
    metric: DistanceMetric,
    id_base: u64,
    target: SqlTarget,
    settings: HashMap<String, String>,
    submitted: usize,
    closed: bool,
}

impl MemoryStore {
    /// Create a store over `base` with 1-based identifiers.
    pub fn new(base: VectorBatch) -> Self {
        Self {
            base,
            metric: DistanceMetric::Euclidean,
            id_base: 1,
            target: SqlTarget::default(),
            settings: HashMap::new(),
            submitted: 0,
            closed: false,
        }
    }

    /// Set the identifier of row 0.
    pub fn with_id_base(mut self, id_base: u64) -> Self {
        self.id_base = id_base;
        self
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Number of queries answered so far.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// True once the store has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The table and columns this store was connected for.
    pub fn target(&self) -> &SqlTarget {
        &self.target
    }

    /// Value of a session setting, if applied.
    pub fn setting(&self, name: &str) -> Option<&str> {
        self.settings.get(name).map(String::as_str)
    }

    /// All rows strictly closer than `threshold`, in row order.
    pub fn range_search(&self, query: &[f32], threshold: f32) -> Vec<u64> {
        self.base
            .iter()
            .enumerate()
            .filter(|(_, v)| self.metric.compute(query, v) < threshold)
            .map(|(i, _)| i as u64 + self.id_base)
            .collect()
    }

    /// The `k` nearest rows passing `filter`, closest first.
    pub fn topk_search(&self, query: &[f32], k: usize, filter: impl Fn(u64) -> bool) -> Vec<u64> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap: BinaryHeap<Scored> = BinaryHeap::with_capacity(k);

        for (i, v) in self.base.iter().enumerate() {
            let id = i as u64 + self.id_base;
            if !filter(id) {
                continue;
            }
            let distance = self.metric.compute(query, v);
            if heap.len() < k {
                heap.push(Scored { id, distance });
            } else if heap.peek().is_some_and(|worst| distance < worst.distance) {
                heap.pop();
                heap.push(Scored { id, distance });
            }
        }

        heap.into_sorted_vec().into_iter().map(|s| s.id).collect()
    }
}

impl QueryStore for MemoryStore {
    fn submit(&mut self, query: &QueryDescriptor) -> std::result::Result<Vec<u64>, StoreError> {
        if self.closed {
            return Err(StoreError::connection("store is closed"));
        }
        if query.vector().len() != self.base.dimension() && !self.base.is_empty() {
            return Err(StoreError::rejected(format!(
                "expected {} dimensions, got {}",
                self.base.dimension(),
                query.vector().len()
            )));
        }
        self.submitted += 1;
        let ids = match query.kind {
            QueryKind::Range { threshold } => self.range_search(query.vector(), threshold),
            QueryKind::TopK { k, filter } => self.topk_search(query.vector(), k, |id| {
                filter.map_or(true, |f| f.matches(id))
            }),
        };
        Ok(ids)
    }

    fn apply_setting(&mut self, name: &str, value: &str) -> std::result::Result<(), StoreError> {
        self.settings.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), StoreError> {
        self.closed = true;
        Ok(())
    }
}

/// Connector that hands out fresh [`MemoryStore`]s over one batch.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    template: MemoryStore,
}

impl MemoryConnector {
    /// Create a connector whose stores serve `base` with 1-based identifiers.
    pub fn new(base: VectorBatch) -> Self {
        Self {
            template: MemoryStore::new(base),
        }
    }

    /// Create a connector from a configured store template.
    pub fn from_store(template: MemoryStore) -> Self {
        Self { template }
    }
}

impl StoreConnector for MemoryConnector {
    type Store = MemoryStore;

    fn connect(&self, target: &SqlTarget) -> std::result::Result<MemoryStore, StoreError> {
        let mut store = self.template.clone();
        store.target = target.clone();
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{IdFilter, QueryGenerator, ScanStrategy};
    use std::cell::Cell;
    use std::rc::Rc;

    fn line_batch() -> VectorBatch {
        // points at x = 0, 1, 2, ..., 9 on a line
        VectorBatch::new(10, 1, (0..10).map(|i| i as f32).collect()).unwrap()
    }

    #[test]
    fn test_range_search_is_strict_and_one_based() {
        let store = MemoryStore::new(line_batch());
        assert_eq!(store.range_search(&[0.0], 2.0), vec![1, 2]);
        assert_eq!(store.range_search(&[4.5], 1.0), vec![5, 6]);
        assert!(store.range_search(&[100.0], 1.0).is_empty());
    }

    #[test]
    fn test_topk_search_with_filter() {
        let store = MemoryStore::new(line_batch()).with_id_base(0);
        assert_eq!(store.topk_search(&[6.2], 3, |_| true), vec![6, 7, 5]);
        assert_eq!(store.topk_search(&[6.2], 2, |id| id < 4), vec![3, 2]);
        assert!(store.topk_search(&[6.2], 0, |_| true).is_empty());
    }

    #[test]
    fn test_submit_both_strategies_agree() {
        let mut store = MemoryStore::new(line_batch());
        let (index_scan, seq_scan) = QueryGenerator::new().range_pair(0, vec![3.0], 1.5);

        let a = store.submit(&index_scan).unwrap();
        let b = store.submit(&seq_scan).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, vec![3, 4, 5]);
        assert_eq!(store.submitted(), 2);
    }

    #[test]
    fn test_submit_topk_descriptor() {
        let mut store = MemoryStore::new(line_batch());
        let batch = VectorBatch::new(1, 1, vec![0.0]).unwrap();
        let query = &QueryGenerator::new().topk_queries(
            &batch,
            2,
            Some(IdFilter::LessThan(100)),
            ScanStrategy::IndexScan,
        )[0];
        assert_eq!(store.submit(query).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_submit_rejects_wrong_dimension() {
        let mut store = MemoryStore::new(line_batch());
        let query = QueryGenerator::new().range(0, vec![1.0, 2.0], 1.0, ScanStrategy::IndexScan);
        let err = store.submit(&query).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Rejected);
    }

    #[test]
    fn test_session_applies_settings() {
        let connector = MemoryConnector::new(line_batch());
        let settings = vec![("hnsw.ef_search".to_string(), "40".to_string())];
        let target = SqlTarget::table("gist1m");
        let mut session = StoreSession::open(&connector, &target, &settings).unwrap();
        assert_eq!(session.store_mut().setting("hnsw.ef_search"), Some("40"));
        assert_eq!(session.store_mut().target().table, "gist1m");
        session.finish().unwrap();
    }

    #[test]
    fn test_closed_store_refuses_queries() {
        let mut store = MemoryStore::new(line_batch());
        let query = QueryGenerator::new().range(0, vec![1.0], 1.0, ScanStrategy::IndexScan);
        store.close().unwrap();
        assert!(store.is_closed());
        let err = store.submit(&query).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Connection);
    }

    #[test]
    fn test_metric_changes_range_answer() {
        let euclidean = MemoryStore::new(line_batch());
        let squared = MemoryStore::new(line_batch()).with_metric(DistanceMetric::EuclideanSquared);
        assert_eq!(euclidean.range_search(&[0.0], 4.0), vec![1, 2, 3, 4]);
        assert_eq!(squared.range_search(&[0.0], 4.0), vec![1, 2]);
    }

    struct CloseTracker {
        closes: Rc<Cell<usize>>,
        reject_settings: bool,
    }

    impl QueryStore for CloseTracker {
        fn submit(&mut self, _: &QueryDescriptor) -> std::result::Result<Vec<u64>, StoreError> {
            Ok(Vec::new())
        }

        fn apply_setting(&mut self, name: &str, _: &str) -> std::result::Result<(), StoreError> {
            if self.reject_settings {
                return Err(StoreError::rejected(format!("unknown setting {name}")));
            }
            Ok(())
        }

        fn close(&mut self) -> std::result::Result<(), StoreError> {
            self.closes.set(self.closes.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_session_closes_exactly_once() {
        let closes = Rc::new(Cell::new(0));
        {
            let _session = StoreSession::new(CloseTracker {
                closes: Rc::clone(&closes),
                reject_settings: false,
            });
        }
        assert_eq!(closes.get(), 1);

        let session = StoreSession::new(CloseTracker {
            closes: Rc::clone(&closes),
            reject_settings: false,
        });
        session.finish().unwrap();
        assert_eq!(closes.get(), 2);
    }

    struct RejectingConnector;

    impl StoreConnector for RejectingConnector {
        type Store = MemoryStore;

        fn connect(&self, _: &SqlTarget) -> std::result::Result<MemoryStore, StoreError> {
            Err(StoreError::connection("refused"))
        }
    }

    #[test]
    fn test_session_connect_failure() {
        let result = StoreSession::open(&RejectingConnector, &SqlTarget::default(), &[]);
        assert!(matches!(result, Err(RangeBenchError::StoreConnection(_))));
    }

    struct StrictSettingsConnector {
        closes: Rc<Cell<usize>>,
    }

    impl StoreConnector for StrictSettingsConnector {
        type Store = CloseTracker;

        fn connect(&self, _: &SqlTarget) -> std::result::Result<CloseTracker, StoreError> {
            Ok(CloseTracker {
                closes: Rc::clone(&self.closes),
                reject_settings: true,
            })
        }
    }

    #[test]
    fn test_rejected_setting_closes_connection() {
        let closes = Rc::new(Cell::new(0));
        let connector = StrictSettingsConnector {
            closes: Rc::clone(&closes),
        };
        let settings = vec![("hnsw.bogus".to_string(), "1".to_string())];
        let result = StoreSession::open(&connector, &SqlTarget::default(), &settings);
        match result {
            Err(RangeBenchError::StoreConnection(err)) => {
                assert_eq!(err.kind, StoreErrorKind::Rejected);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("rejected setting opened a session"),
        }
        assert_eq!(closes.get(), 1);
    }
}
