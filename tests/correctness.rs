//! End-to-end correctness tests: files on disk, a store, and graded runs.
//!
//! Run with: cargo test --test correctness

use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use range_bench::codec::{save_ground_truth, save_vector_batch, write_ground_truth};
use range_bench::persistence::{load_run, save_run};
use range_bench::query::SqlParam;
use range_bench::store::StoreErrorKind;
use range_bench::{
    evaluate_topk, read_ground_truth, BenchmarkConfig, CancelToken, Dataset, GroundTruth, IdFilter,
    IdOffset, MemoryConnector, MemoryStore, QueryDescriptor, QueryExecutor, QueryGenerator,
    QueryStore, RangeBenchError, RangeBenchmark, RecallEvaluator, ScanStrategy, SqlTarget,
    StoreError, VectorBatch,
};

/// Store that answers each query index with a fixed id list.
struct ScriptedStore {
    answers: HashMap<usize, Vec<u64>>,
}

impl ScriptedStore {
    fn new(answers: &[&[u64]]) -> Self {
        Self {
            answers: answers
                .iter()
                .enumerate()
                .map(|(i, ids)| (i, ids.to_vec()))
                .collect(),
        }
    }
}

impl QueryStore for ScriptedStore {
    fn submit(&mut self, query: &QueryDescriptor) -> Result<Vec<u64>, StoreError> {
        self.answers
            .get(&query.index)
            .cloned()
            .ok_or_else(|| StoreError::rejected(format!("no answer for query {}", query.index)))
    }
}

/// `nq=2`, `offsets=[0,2,3]`, `neighbor_ids=[10,11,20]`.
fn worked_ground_truth() -> GroundTruth {
    GroundTruth::new(200.0, vec![0, 2, 3], vec![10, 11, 20], vec![1.0, 2.0, 3.0]).unwrap()
}

fn worked_queries() -> VectorBatch {
    VectorBatch::new(2, 2, vec![0.0, 0.0, 1.0, 1.0]).unwrap()
}

fn run_scripted(answers: &[&[u64]]) -> range_bench::ExecutionRun {
    let mut store = ScriptedStore::new(answers);
    let descriptors =
        QueryGenerator::new().range_queries(&worked_queries(), 200.0, ScanStrategy::IndexScan);
    QueryExecutor::new(&mut store)
        .with_progress_interval(0)
        .run(&descriptors)
        .unwrap()
}

#[test]
fn test_offset_corrected_exact_answers() {
    let gt = worked_ground_truth();
    let run = run_scripted(&[&[11, 12], &[21]]);

    let evaluator = RecallEvaluator::new(&gt).with_per_query_recall(true);
    let report = evaluator.evaluate(&run).unwrap();

    assert_eq!(report.per_query_recall, Some(vec![1.0, 1.0]));
    assert_eq!(report.aggregate_recall, 1.0);
    assert_eq!(report.query_count, 2);
}

#[test]
fn test_one_empty_answer_halves_recall() {
    let gt = worked_ground_truth();
    let run = run_scripted(&[&[], &[21]]);

    let report = RecallEvaluator::new(&gt)
        .with_per_query_recall(true)
        .evaluate(&run)
        .unwrap();

    assert_eq!(report.per_query_recall, Some(vec![0.0, 1.0]));
    assert_eq!(report.aggregate_recall, 0.5);
}

#[test]
fn test_record_count_mismatch_is_alignment_error() {
    let gt = worked_ground_truth();
    let mut run = run_scripted(&[&[11, 12], &[21]]);
    run.records.pop();

    let err = RecallEvaluator::new(&gt).evaluate(&run).unwrap_err();
    assert!(matches!(
        err,
        RangeBenchError::Alignment {
            records: 1,
            queries: 2
        }
    ));
}

#[test]
fn test_truncated_distances_is_format_error() {
    let mut bytes = Vec::new();
    write_ground_truth(&mut bytes, &worked_ground_truth()).unwrap();
    bytes.truncate(bytes.len() - 2);

    let err = read_ground_truth(Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, RangeBenchError::Format(_)));
}

#[test]
fn test_store_failure_names_query_and_descriptor() {
    let mut store = ScriptedStore::new(&[&[1]]);
    let descriptors =
        QueryGenerator::new().range_queries(&worked_queries(), 5.0, ScanStrategy::SequentialScan);

    let err = QueryExecutor::new(&mut store)
        .run(&descriptors)
        .unwrap_err();

    match err {
        RangeBenchError::StoreExecution {
            index,
            descriptor,
            source,
            ..
        } => {
            assert_eq!(index, 1);
            assert_eq!(descriptor.strategy, ScanStrategy::SequentialScan);
            assert_eq!(descriptor.threshold(), Some(5.0));
            assert_eq!(source.kind, StoreErrorKind::Rejected);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_cancellation_between_queries() {
    let token = CancelToken::new();
    let mut store = ScriptedStore::new(&[&[1], &[2]]);
    let descriptors =
        QueryGenerator::new().range_queries(&worked_queries(), 5.0, ScanStrategy::IndexScan);

    let mut executor = QueryExecutor::new(&mut store).with_cancel_token(token.clone());
    executor.execute(&descriptors[0]).unwrap();
    token.cancel();
    let err = executor.run(&descriptors).unwrap_err();
    assert!(matches!(err, RangeBenchError::Cancelled { completed: 0 }));
}

#[test]
fn test_descriptor_pair_renders_distinct_sql() {
    let (index_scan, seq_scan) = QueryGenerator::new().range_pair(7, vec![0.25f32, -1.5], 200.0);
    let target = SqlTarget::default();

    let index_sql = index_scan.to_sql(&target);
    let seq_sql = seq_scan.to_sql(&target);

    assert_ne!(index_sql.text, seq_sql.text);
    assert!(index_sql.text.contains("ANN_DWithin"));
    assert!(!seq_sql.text.contains("ANN_DWithin"));
    for sql in [&index_sql, &seq_sql] {
        assert!(!sql.text.contains("0.25"));
        assert!(sql.params.contains(&SqlParam::Float(200.0)));
    }
    assert_eq!(index_scan.vector(), seq_scan.vector());
}

#[test]
fn test_synthetic_benchmark_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Dataset::generate(400, 25, 8, 1.5, 7).unwrap();
    assert!(dataset.ground_truth.total_neighbors() > 0);

    let query_path = dir.path().join("query.bin");
    let gt_path = dir.path().join("gt.bin");
    save_vector_batch(&query_path, &dataset.queries).unwrap();
    save_ground_truth(&gt_path, &dataset.ground_truth).unwrap();

    let results = dir.path().join("results");
    let config = BenchmarkConfig::new(&query_path, &gt_path)
        .with_session_setting("hnsw.ef_search", "40")
        .with_per_query_recall(true)
        .with_results_dir(&results);
    let outcome = RangeBenchmark::new(config, MemoryConnector::new(dataset.base.clone()))
        .run()
        .unwrap();

    for strategy in ScanStrategy::ALL {
        let report = outcome.report(strategy).unwrap();
        assert_eq!(report.query_count, 25);
        assert_eq!(report.aggregate_recall, 1.0);
        assert_eq!(report.latency.count, 25);
        assert!(report.qps > 0.0);
    }

    let seq = load_run(results.join("sequential-scan.rbr")).unwrap();
    let idx = load_run(results.join("index-scan.rbr")).unwrap();
    assert_eq!(seq.len(), 25);
    for (a, b) in seq.records.iter().zip(&idx.records) {
        assert_eq!(a.result_ids, b.result_ids);
    }
    assert!(results.join("outcome.json").exists());
}

#[test]
fn test_zero_based_store_needs_zero_offset() {
    let dataset = Dataset::generate(300, 10, 8, 1.3, 11).unwrap();
    let connector = MemoryConnector::from_store(MemoryStore::new(dataset.base.clone()).with_id_base(0));

    let mismatched = BenchmarkConfig::default().with_progress_interval(0);
    let matched = mismatched.clone().with_id_offset(IdOffset::NONE);

    let good = RangeBenchmark::new(matched, connector.clone())
        .run_with(&dataset.queries, &dataset.ground_truth)
        .unwrap();
    assert_eq!(good.index_scan.unwrap().aggregate_recall, 1.0);

    let bad = RangeBenchmark::new(mismatched, connector)
        .run_with(&dataset.queries, &dataset.ground_truth)
        .unwrap();
    let bad_recall = bad.index_scan.unwrap().aggregate_recall;

    // the store returns the true rows `g`, graded against `g + 1`
    let gt = &dataset.ground_truth;
    assert!(gt.total_neighbors() > 0);
    let expected = (0..gt.query_count())
        .map(|i| {
            let truth: HashSet<u32> = gt.neighbors(i).iter().copied().collect();
            if truth.is_empty() {
                return 1.0;
            }
            let hits = truth.iter().filter(|&&g| truth.contains(&(g + 1))).count();
            hits as f64 / truth.len() as f64
        })
        .sum::<f64>()
        / gt.query_count() as f64;
    assert!(bad_recall < 1.0);
    assert!((bad_recall - expected).abs() < 1e-12);
}

#[test]
fn test_filtered_topk_against_prefilter_baseline() {
    let dataset = Dataset::generate(500, 20, 8, 1.0, 3).unwrap();
    let generator = QueryGenerator::new();
    let filter = Some(IdFilter::LessThan(250));

    let mut store = MemoryStore::new(dataset.base.clone());
    let baseline_queries =
        generator.topk_queries(&dataset.queries, 10, filter, ScanStrategy::SequentialScan);
    let target_queries = generator.topk_queries(&dataset.queries, 10, filter, ScanStrategy::IndexScan);

    let baseline = QueryExecutor::new(&mut store).run(&baseline_queries).unwrap();
    let target = QueryExecutor::new(&mut store).run(&target_queries).unwrap();

    for record in &target.records {
        assert_eq!(record.result_ids.len(), 10);
        assert!(record.result_ids.iter().all(|id| *id < 250));
    }

    let report = evaluate_topk(&baseline, &target, 10).unwrap();
    assert_eq!(report.recall, 1.0);
    assert_eq!(report.short_results, 0);
    assert_eq!(report.query_count, 20);
}

#[test]
fn test_runs_survive_the_result_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.rbr");
    let run = run_scripted(&[&[11, 12], &[21]]);

    save_run(&path, &run).unwrap();
    let loaded = load_run(&path).unwrap();
    assert_eq!(loaded, run);

    let gt = worked_ground_truth();
    let report = RecallEvaluator::new(&gt).evaluate(&loaded).unwrap();
    assert_eq!(report.aggregate_recall, 1.0);
}
