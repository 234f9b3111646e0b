//! Dataset utilities for generating synthetic benchmarks and exact ground truth.
//!
//! Real runs read vector and ground-truth files produced by external tools.
//! These helpers produce the same structures in-process so the harness can be
//! exercised end to end without a database or a multi-gigabyte dataset.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::distance::DistanceMetric;
use crate::error::{RangeBenchError, Result};
use crate::types::{GroundTruth, VectorBatch};

/// Base vectors, query vectors and their exact range ground truth.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Vectors stored in the store under test.
    pub base: VectorBatch,
    /// Query vectors, one per ground-truth row.
    pub queries: VectorBatch,
    /// Exact neighbors of each query within the threshold.
    pub ground_truth: GroundTruth,
}

impl Dataset {
    /// Generate a seeded random dataset and its exact ground truth.
    ///
    /// Components are uniform in `[-1.0, 1.0]`.
    pub fn generate(
        n_base: usize,
        n_queries: usize,
        dim: usize,
        threshold: f32,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let base = random_batch(&mut rng, n_base, dim)?;
        let queries = random_batch(&mut rng, n_queries, dim)?;
        let ground_truth = compute_range_ground_truth(&base, &queries, threshold)?;
        Ok(Self {
            base,
            queries,
            ground_truth,
        })
    }
}

/// A seeded batch of `count` random vectors with components in `[-1.0, 1.0]`.
pub fn synthetic_batch(count: usize, dim: usize, seed: u64) -> Result<VectorBatch> {
    let mut rng = StdRng::seed_from_u64(seed);
    random_batch(&mut rng, count, dim)
}

fn random_batch(rng: &mut StdRng, count: usize, dim: usize) -> Result<VectorBatch> {
    let data: Vec<f32> = (0..count * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    VectorBatch::new(count, dim, data)
}

/// Exact L2 range ground truth with 0-based base row ids.
///
/// A base row is a neighbor when its distance is strictly below
/// `threshold`. Neighbors are listed in base-row order. Queries are
/// processed in parallel.
pub fn compute_range_ground_truth(
    base: &VectorBatch,
    queries: &VectorBatch,
    threshold: f32,
) -> Result<GroundTruth> {
    if !base.is_empty() && !queries.is_empty() && base.dimension() != queries.dimension() {
        return Err(RangeBenchError::invalid_parameter(format!(
            "base dimension {} != query dimension {}",
            base.dimension(),
            queries.dimension()
        )));
    }
    let metric = DistanceMetric::Euclidean;

    let lists: Vec<Vec<(u32, f32)>> = (0..queries.count())
        .into_par_iter()
        .map(|q| {
            let query = queries.vector(q);
            base.iter()
                .enumerate()
                .filter_map(|(i, v)| {
                    let distance = metric.compute(query, v);
                    (distance < threshold).then_some((i as u32, distance))
                })
                .collect()
        })
        .collect();

    GroundTruth::from_neighbor_lists(threshold, &lists)
}
