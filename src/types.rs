//! Core data types shared by the codec, generator and evaluator.
//!
//! [`VectorBatch`] and [`GroundTruth`] are built once from a decode pass and
//! never mutated afterwards. Constructors validate their invariants so the
//! rest of the crate can index into them without re-checking.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

use crate::error::{RangeBenchError, Result};

/// Signed shift between ground-truth neighbor ids and the ids a store returns.
///
/// A store whose identifiers start one higher than the ground-truth numbering
/// (e.g. a `bigserial` primary key against 0-based file row numbers) uses
/// `IdOffset(1)`. A wrong offset does not raise any error, it only collapses
/// recall, so it is kept explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct IdOffset(pub i64);

impl IdOffset {
    /// Store ids equal ground-truth ids.
    pub const NONE: IdOffset = IdOffset(0);

    /// Create a new offset.
    #[inline]
    pub const fn new(offset: i64) -> Self {
        Self(offset)
    }

    /// Map a ground-truth id into the store's id space.
    ///
    /// Returns `None` when the shifted id would be negative, which can never
    /// match a returned identifier.
    #[inline]
    pub fn to_store_id(self, gt_id: u32) -> Option<u64> {
        let shifted = gt_id as i64 + self.0;
        u64::try_from(shifted).ok()
    }
}

impl Default for IdOffset {
    fn default() -> Self {
        Self(crate::constants::evaluation::DEFAULT_ID_OFFSET)
    }
}

impl fmt::Display for IdOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.0)
    }
}

/// An ordered batch of fixed-dimension `f32` vectors stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorBatch {
    count: usize,
    dimension: usize,
    data: Vec<f32>,
}

impl VectorBatch {
    /// Create a batch from flat row-major data.
    ///
    /// # Errors
    /// Returns a format error if `data.len() != count * dimension`, or if
    /// `dimension` is zero while `count` is not.
    pub fn new(count: usize, dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 && count > 0 {
            return Err(RangeBenchError::format(format!(
                "dimension is zero for {count} vectors"
            )));
        }
        let expected = count.checked_mul(dimension).ok_or_else(|| {
            RangeBenchError::format(format!("count {count} * dimension {dimension} overflows"))
        })?;
        if data.len() != expected {
            return Err(RangeBenchError::format(format!(
                "payload holds {} floats, expected {} ({} x {})",
                data.len(),
                expected,
                count,
                dimension
            )));
        }
        Ok(Self {
            count,
            dimension,
            data,
        })
    }

    /// Build a batch from individual rows, all of the same length.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let dimension = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * dimension);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != dimension {
                return Err(RangeBenchError::invalid_parameter(format!(
                    "row {i} has dimension {}, expected {dimension}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Self::new(rows.len(), dimension, data)
    }

    /// Number of vectors.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Dimension of every vector.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// True if the batch holds no vectors.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The `i`-th vector.
    ///
    /// # Panics
    /// Panics if `i >= count`.
    #[inline]
    pub fn vector(&self, i: usize) -> &[f32] {
        let start = i * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// Iterate over the vectors in order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        // chunks_exact would panic on a zero dimension; an empty batch has no rows anyway
        let dim = self.dimension.max(1);
        self.data.chunks_exact(dim).take(self.count)
    }

    /// The flat row-major payload.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Range-search ground truth in compressed-sparse-row layout.
///
/// The true neighbors of query `i` are
/// `neighbor_ids[offsets[i]..offsets[i + 1]]`, all within `threshold`.
/// Deserialized input goes through [`GroundTruth::new`] as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GroundTruthParts")]
pub struct GroundTruth {
    threshold: f32,
    offsets: Vec<u32>,
    neighbor_ids: Vec<u32>,
    neighbor_distances: Vec<f32>,
}

impl GroundTruth {
    /// Create a ground truth, validating the CSR invariants.
    ///
    /// # Errors
    /// Returns a format error if `offsets` is empty, does not start at zero,
    /// decreases, or if the id/distance arrays do not have `offsets[nq]`
    /// entries.
    pub fn new(
        threshold: f32,
        offsets: Vec<u32>,
        neighbor_ids: Vec<u32>,
        neighbor_distances: Vec<f32>,
    ) -> Result<Self> {
        validate_offsets(&offsets)?;
        let total = *offsets.last().unwrap_or(&0) as usize;
        if neighbor_ids.len() != total {
            return Err(RangeBenchError::format(format!(
                "expected {total} neighbor ids, got {}",
                neighbor_ids.len()
            )));
        }
        if neighbor_distances.len() != total {
            return Err(RangeBenchError::format(format!(
                "expected {total} neighbor distances, got {}",
                neighbor_distances.len()
            )));
        }
        Ok(Self {
            threshold,
            offsets,
            neighbor_ids,
            neighbor_distances,
        })
    }

    /// Build a ground truth from per-query `(id, distance)` lists.
    pub fn from_neighbor_lists(threshold: f32, lists: &[Vec<(u32, f32)>]) -> Result<Self> {
        let mut offsets = Vec::with_capacity(lists.len() + 1);
        let mut ids = Vec::new();
        let mut distances = Vec::new();
        offsets.push(0u32);
        for list in lists {
            for &(id, distance) in list {
                ids.push(id);
                distances.push(distance);
            }
            let end = u32::try_from(ids.len()).map_err(|_| {
                RangeBenchError::invalid_parameter("more than u32::MAX neighbors in total")
            })?;
            offsets.push(end);
        }
        Self::new(threshold, offsets, ids, distances)
    }

    /// Number of queries (`nq`).
    #[inline]
    pub fn query_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Distance threshold shared by all queries.
    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// The `nq + 1` CSR offsets.
    #[inline]
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// All neighbor ids, flat.
    #[inline]
    pub fn neighbor_ids(&self) -> &[u32] {
        &self.neighbor_ids
    }

    /// All neighbor distances, flat and parallel to [`neighbor_ids`](Self::neighbor_ids).
    #[inline]
    pub fn neighbor_distances(&self) -> &[f32] {
        &self.neighbor_distances
    }

    /// Half-open range of query `i` inside the flat arrays.
    #[inline]
    pub fn range(&self, i: usize) -> Range<usize> {
        self.offsets[i] as usize..self.offsets[i + 1] as usize
    }

    /// True neighbor ids of query `i`.
    #[inline]
    pub fn neighbors(&self, i: usize) -> &[u32] {
        &self.neighbor_ids[self.range(i)]
    }

    /// Distances of the true neighbors of query `i`.
    #[inline]
    pub fn distances(&self, i: usize) -> &[f32] {
        &self.neighbor_distances[self.range(i)]
    }

    /// Total number of neighbors over all queries.
    #[inline]
    pub fn total_neighbors(&self) -> usize {
        self.neighbor_ids.len()
    }
}

/// Unvalidated wire form of a [`GroundTruth`].
#[derive(Deserialize)]
struct GroundTruthParts {
    threshold: f32,
    offsets: Vec<u32>,
    neighbor_ids: Vec<u32>,
    neighbor_distances: Vec<f32>,
}

impl TryFrom<GroundTruthParts> for GroundTruth {
    type Error = RangeBenchError;

    fn try_from(parts: GroundTruthParts) -> Result<Self> {
        Self::new(
            parts.threshold,
            parts.offsets,
            parts.neighbor_ids,
            parts.neighbor_distances,
        )
    }
}

/// Check the CSR offset invariants: non-empty, `offsets[0] == 0`, non-decreasing.
pub(crate) fn validate_offsets(offsets: &[u32]) -> Result<()> {
    match offsets.first() {
        None => return Err(RangeBenchError::format("offsets array is empty")),
        Some(&first) if first != 0 => {
            return Err(RangeBenchError::format(format!(
                "offsets[0] must be 0, got {first}"
            )))
        }
        _ => {}
    }
    if let Some(i) = offsets.windows(2).position(|w| w[1] < w[0]) {
        return Err(RangeBenchError::format(format!(
            "offsets decrease at query {i}: {} > {}",
            offsets[i],
            offsets[i + 1]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_offset() {
        let offset = IdOffset::default();
        assert_eq!(offset, IdOffset(1));
        assert_eq!(offset.to_store_id(10), Some(11));
        assert_eq!(IdOffset::new(-1).to_store_id(0), None);
        assert_eq!(IdOffset::NONE.to_store_id(5), Some(5));
        assert_eq!(format!("{}", offset), "+1");
    }

    #[test]
    fn test_vector_batch_access() {
        let batch = VectorBatch::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(batch.count(), 2);
        assert_eq!(batch.dimension(), 3);
        assert_eq!(batch.vector(1), &[4.0, 5.0, 6.0]);

        let rows: Vec<&[f32]> = batch.iter().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_vector_batch_rejects_bad_shape() {
        assert!(VectorBatch::new(2, 3, vec![0.0; 5]).is_err());
        assert!(VectorBatch::new(1, 0, vec![]).is_err());
        assert!(VectorBatch::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());

        let empty = VectorBatch::new(0, 0, vec![]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.iter().count(), 0);
    }

    #[test]
    fn test_ground_truth_slices() {
        let gt = GroundTruth::new(
            300.0,
            vec![0, 2, 2, 3],
            vec![10, 11, 20],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap();

        assert_eq!(gt.query_count(), 3);
        assert_eq!(gt.neighbors(0), &[10, 11]);
        assert!(gt.neighbors(1).is_empty());
        assert_eq!(gt.neighbors(2), &[20]);
        assert_eq!(gt.distances(2), &[3.0]);
        assert_eq!(gt.total_neighbors(), 3);
    }

    #[test]
    fn test_ground_truth_rejects_bad_offsets() {
        assert!(GroundTruth::new(1.0, vec![], vec![], vec![]).is_err());
        assert!(GroundTruth::new(1.0, vec![1, 2], vec![0, 0], vec![0.0, 0.0]).is_err());
        assert!(GroundTruth::new(1.0, vec![0, 2, 1], vec![0, 0], vec![0.0, 0.0]).is_err());
        assert!(GroundTruth::new(1.0, vec![0, 2], vec![0], vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn test_from_neighbor_lists() {
        let gt = GroundTruth::from_neighbor_lists(
            5.0,
            &[vec![(3, 0.5), (7, 1.5)], vec![], vec![(1, 4.0)]],
        )
        .unwrap();
        assert_eq!(gt.offsets(), &[0, 2, 2, 3]);
        assert_eq!(gt.neighbor_ids(), &[3, 7, 1]);
        assert_eq!(gt.neighbor_distances(), &[0.5, 1.5, 4.0]);
    }

    #[test]
    fn test_ground_truth_deserialize_validates() {
        let gt = GroundTruth::new(2.0, vec![0, 1, 1], vec![4], vec![0.5]).unwrap();
        let json = serde_json::to_string(&gt).unwrap();
        let back: GroundTruth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, gt);

        let no_offsets = r#"{"threshold":1.0,"offsets":[],"neighbor_ids":[],"neighbor_distances":[]}"#;
        assert!(serde_json::from_str::<GroundTruth>(no_offsets).is_err());

        let short_ids = r#"{"threshold":1.0,"offsets":[0,5],"neighbor_ids":[1],"neighbor_distances":[0.1]}"#;
        assert!(serde_json::from_str::<GroundTruth>(short_ids).is_err());
    }
}
