//! Distance functions used for exact range and top-k search.
//!
//! Range thresholds in ground-truth files are plain (non-squared) L2
//! distances, matching the store's `<->` operator.

/// Supported distance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance: sqrt(sum((a[i] - b[i])^2))
    #[default]
    Euclidean,
    /// Squared Euclidean distance: sum((a[i] - b[i])^2)
    EuclideanSquared,
}

impl DistanceMetric {
    /// Compute the distance between two vectors using this metric.
    ///
    /// # Panics
    /// Panics if the vectors have different dimensions.
    #[inline]
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::EuclideanSquared => euclidean_distance_squared(a, b),
        }
    }
}

/// Compute the Euclidean (L2) distance between two vectors.
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    euclidean_distance_squared(a, b).sqrt()
}

/// Compute the squared Euclidean distance between two vectors.
#[inline]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance_simple() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((DistanceMetric::Euclidean.compute(&a, &b) - 5.0).abs() < 1e-6);
        assert!((DistanceMetric::EuclideanSquared.compute(&a, &b) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!(euclidean_distance(&a, &a) < 1e-6);
    }

    #[test]
    #[should_panic(expected = "Vector dimensions must match")]
    fn test_dimension_mismatch_panics() {
        euclidean_distance(&[1.0], &[1.0, 2.0]);
    }
}
