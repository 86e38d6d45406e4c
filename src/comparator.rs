//! ## Dimensional abstractions
//!
//! Every tree in this crate is generic over the stored value type `T` and over a *comparator* or
//! *metric* capability chosen by the caller at construction time. These are the extension points
//! described in the crate's design notes: two small, usually zero-sized, capability types rather
//! than a single fat trait, so that comparisons specialize at compile time instead of going
//! through virtual dispatch in the hot recursion of `Build` and the query traversals.
//!
//! This mirrors the `DistanceMetric<P>` marker-type pattern the rest of this crate's sibling
//! space-partitioning trees use for k-nearest-neighbor search (a caller picks `EuclideanDistance`,
//! `ManhattanDistance`, or any other zero-sized type implementing the trait via a turbofish at the
//! call site), generalized here to also drive the sort order that the static and growing trees
//! are built around.

use std::cmp::Ordering;

/// A total order on each dimension of `T`.
///
/// Implementations must be deterministic and pure: calling `compare` twice with the same
/// arguments must return the same result, and the order induced by fixing `dim` must be a total
/// order. Comparators that violate this are outside the library's contract (see the crate's
/// error-handling documentation); the library may loop or produce incorrect results.
pub trait Comparator<T> {
    /// Compares `left` and `right` along dimension `dim`.
    fn compare(&self, left: &T, right: &T, dim: usize) -> Ordering;
}

/// A Euclidean-style metric on `T`: a scalar coordinate per dimension.
///
/// Any `Metric` induces a [`Comparator`] by comparing coordinates (see the blanket impl below),
/// and additionally unlocks `nearest_neighbor` on [`crate::kd_tree::KdTree`] and
/// [`crate::bkd_tree::BkdTree`].
///
/// NaN coordinates are undefined behavior for ordering purposes: inputs are assumed NaN-free.
pub trait Metric<T> {
    /// Returns the coordinate of `value` along dimension `dim`.
    fn coord(&self, value: &T, dim: usize) -> f64;

    /// Returns the squared Euclidean distance between `a` and `b` across all `dims` dimensions.
    fn distance_sq(&self, a: &T, b: &T, dims: usize) -> f64 {
        (0..dims)
            .map(|d| {
                let diff = self.coord(a, d) - self.coord(b, d);
                diff * diff
            })
            .sum()
    }
}

/// Every [`Metric`] is also a [`Comparator`]: comparing two values on a dimension is comparing
/// their coordinates on that dimension.
impl<T, M: Metric<T>> Comparator<T> for M {
    fn compare(&self, left: &T, right: &T, dim: usize) -> Ordering {
        self.coord(left, dim)
            .partial_cmp(&self.coord(right, dim))
            .unwrap_or(Ordering::Equal)
    }
}

/// The standard Euclidean metric over any `T` that exposes `f64` coordinates through a plain
/// accessor function. Most callers reach for this rather than writing their own [`Metric`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EuclideanMetric<F> {
    coord_fn: F,
}

impl<T, F> EuclideanMetric<F>
where
    F: Fn(&T, usize) -> f64,
{
    /// Builds a Euclidean metric from a coordinate accessor.
    pub fn new(coord_fn: F) -> Self {
        EuclideanMetric { coord_fn }
    }
}

impl<T, F> Metric<T> for EuclideanMetric<F>
where
    F: Fn(&T, usize) -> f64,
{
    fn coord(&self, value: &T, dim: usize) -> f64 {
        (self.coord_fn)(value, dim)
    }
}
