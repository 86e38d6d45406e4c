//! ## Static KD-tree
//!
//! `KdTree<T, C>` indexes a fixed point set of type `T` across a caller-chosen number of
//! dimensions `D`, using a user-supplied [`Comparator`]. It stores all points in one contiguous
//! array plus a parallel array of "dirty" bits, and builds that layout once via a recursive
//! sort-and-median-partition (`Build`) that never needs to move the data again.
//!
//! The **dirty flag** on a node is the non-obvious piece of this layout: duplicate values are
//! allowed, and a stable sort at each level does not guarantee that every duplicate of the pivot
//! ends up to its right. The flag records whether any slot to the pivot's left, within the
//! subrange being built, compares equal to the pivot on the split dimension; query code checks it
//! to decide whether it also has to descend left on an exact match, the same way the sibling
//! trees in this crate use a marker-type `DistanceMetric<P>` to keep nearest-neighbor comparisons
//! branch-free and compile-time specialized.
//!
//! ### Example
//!
//! ```
//! use kdcascade::comparator::EuclideanMetric;
//! use kdcascade::kd_tree::KdTree;
//!
//! let points = vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
//! let metric = EuclideanMetric::new(|p: &(f64, f64), d: usize| if d == 0 { p.0 } else { p.1 });
//! let tree = KdTree::new(2, points, metric, 1).unwrap();
//!
//! assert!(tree.contains(&(1.0, 1.0)));
//! let (nearest, dist_sq) = tree.nearest_neighbor(&(1.1, 1.1)).unwrap();
//! assert_eq!(nearest, (1.0, 1.0));
//! assert!(dist_sq < 0.1);
//! ```

use std::cmp::Ordering;

use tracing::info;

use crate::comparator::{Comparator, Metric};
use crate::errors::CascadeError;
use crate::parallel::{ParallelCoordinator, DEFAULT_PARALLEL_THRESHOLD};
use crate::segment::Segment;

/// Tuning knobs for `KdTree` construction beyond the plain `max_threads` parameter.
#[derive(Debug, Clone, Copy)]
pub struct KdTreeConfig {
    /// Effective parallelism cap for the build. Values `<= 1` disable forking entirely.
    pub max_threads: usize,
    /// Minimum subrange size eligible to fork a build task onto a worker thread.
    pub parallel_threshold: usize,
}

impl Default for KdTreeConfig {
    fn default() -> Self {
        KdTreeConfig {
            max_threads: 1,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

/// A balanced, immutable KD-tree over values of type `T`.
///
/// See the module documentation for the layout invariant this type maintains.
pub struct KdTree<T, C> {
    dims: usize,
    comparator: C,
    values: Vec<T>,
    dirty: Vec<bool>,
}

/// `KdTree<T, M>` where `M` is a [`Metric`] — the reader-facing name for the nearest-neighbor
/// capable variant described in the crate's external interface.
pub type MetricKdTree<T, M> = KdTree<T, M>;

fn median_index(l: usize, r: usize) -> usize {
    // `l..r` is a half-open range mirroring the inclusive `[l..r]` of the design notes; this is
    // the floor((l + r_inclusive) / 2) median, re-derived for the half-open convention.
    l + (r - l - 1) / 2
}

/// Applies a permutation to a slice in place without requiring `T: Clone`, following each cycle
/// of the permutation with swaps. `perm[i]` is the index that should end up at position `i`; it
/// is consumed (mutated into the identity) as the permutation is applied.
fn apply_permutation<T>(slice: &mut [T], mut perm: Vec<usize>) {
    for i in 0..perm.len() {
        while perm[i] != i {
            let j = perm[i];
            slice.swap(i, j);
            perm.swap(i, j);
        }
    }
}

/// Finds the lowest index in `[0, m]` whose value compares equal to `values[m]` on dimension `d`,
/// given that `values[0..=m]` is sorted ascending on that dimension. This is `FindFirstIndexOf`
/// from the design notes, specialized to a standard lower-bound binary search.
fn lower_bound_equal<T, C: Comparator<T>>(
    values: &[T],
    m: usize,
    d: usize,
    comparator: &C,
) -> usize {
    let mut lo = 0usize;
    let mut hi = m;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if comparator.compare(&values[mid], &values[m], d) == Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

fn build_recursive<T, C>(
    values: &mut [T],
    dirty: &mut [bool],
    d: usize,
    dims: usize,
    comparator: &C,
    coord: &ParallelCoordinator,
) where
    T: Send,
    C: Comparator<T> + Sync,
{
    let n = values.len();
    if n == 0 {
        return;
    }
    if n > 1 {
        let mut idx: Vec<usize> = (0..n).collect();
        idx.sort_by(|&a, &b| comparator.compare(&values[a], &values[b], d));
        // `idx` is a gather permutation: `idx[k]` is the source index that belongs at sorted
        // position `k`. `apply_permutation` is a scatter applier (it moves the element currently
        // at `i` to position `perm[i]`), so invert `idx` into a scatter permutation before
        // applying it, or the array ends up in the inverse of sorted order.
        let mut scatter = vec![0usize; n];
        for (k, &src) in idx.iter().enumerate() {
            scatter[src] = k;
        }
        apply_permutation(values, scatter.clone());
        apply_permutation(dirty, scatter);
    }

    let m = median_index(0, n);
    let first = lower_bound_equal(values, m, d, comparator);
    dirty[m] = first < m;

    let next_d = (d + 1) % dims;
    let (left, rest) = values.split_at_mut(m);
    let (_, right) = rest.split_at_mut(1);
    let (dleft, drest) = dirty.split_at_mut(m);
    let (_, dright) = drest.split_at_mut(1);

    let fork_left = !left.is_empty() && coord.worth_forking(left.len()) && coord.try_acquire();
    if fork_left {
        std::thread::scope(|scope| {
            let handle = scope.spawn(|| {
                build_recursive(left, dleft, next_d, dims, comparator, coord);
            });
            build_recursive(right, dright, next_d, dims, comparator, coord);
            handle.join().expect("kd-tree build worker panicked");
        });
        coord.release();
    } else {
        build_recursive(left, dleft, next_d, dims, comparator, coord);
        build_recursive(right, dright, next_d, dims, comparator, coord);
    }
}

impl<T, C> KdTree<T, C>
where
    T: Clone + Send,
    C: Comparator<T> + Sync,
{
    /// Builds a KD-tree from a single sequence of values.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::InvalidArgument`] if `dims == 0` or `values` is empty.
    pub fn new(dims: usize, values: Vec<T>, comparator: C, max_threads: usize) -> Result<Self, CascadeError> {
        let config = KdTreeConfig {
            max_threads,
            ..KdTreeConfig::default()
        };
        Self::with_config(dims, values, comparator, config)
    }

    /// Builds a KD-tree from a single sequence of values, with full control over the parallel
    /// build policy via `config`.
    pub fn with_config(
        dims: usize,
        values: Vec<T>,
        comparator: C,
        config: KdTreeConfig,
    ) -> Result<Self, CascadeError> {
        let segment = Segment::whole(&values);
        Self::from_segments_with_config(dims, &[segment], comparator, config)
    }

    /// Builds a KD-tree from one or more input segments, which together hold all `N` points.
    /// Segment `i`'s contents occupy a contiguous block of the final layout whose start offset is
    /// the sum of prior segments' lengths.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::InvalidArgument`] if `dims == 0` or the segments are collectively
    /// empty.
    pub fn from_segments(
        dims: usize,
        segments: &[Segment<T>],
        comparator: C,
        max_threads: usize,
    ) -> Result<Self, CascadeError> {
        let config = KdTreeConfig {
            max_threads,
            ..KdTreeConfig::default()
        };
        Self::from_segments_with_config(dims, segments, comparator, config)
    }

    /// As [`Self::from_segments`], with full control over the parallel build policy.
    pub fn from_segments_with_config(
        dims: usize,
        segments: &[Segment<T>],
        comparator: C,
        config: KdTreeConfig,
    ) -> Result<Self, CascadeError> {
        if dims == 0 {
            return Err(CascadeError::InvalidArgument {
                reason: "dims must be >= 1".to_string(),
            });
        }
        let n: usize = segments.iter().map(Segment::len).sum();
        if n == 0 {
            return Err(CascadeError::InvalidArgument {
                reason: "cannot build a KdTree from an empty value collection".to_string(),
            });
        }

        info!("building KdTree: dims={}, n={}", dims, n);

        let mut values: Vec<T> = Vec::with_capacity(n);
        if config.max_threads > 1 && segments.len() > 1 {
            copy_segments_parallel(segments, &mut values);
        } else {
            for segment in segments {
                values.extend_from_slice(segment.as_slice());
            }
        }
        let mut dirty = vec![false; n];

        let coord = ParallelCoordinator::new(config.max_threads, config.parallel_threshold);
        build_recursive(&mut values, &mut dirty, 0, dims, &comparator, &coord);

        Ok(KdTree {
            dims,
            comparator,
            values,
            dirty,
        })
    }
}

/// Clones each segment's contents into its own `Vec` in parallel (the expensive part when `T`'s
/// clone is non-trivial), then concatenates them in order.
fn copy_segments_parallel<T: Clone + Send>(segments: &[Segment<T>], out: &mut Vec<T>) {
    let cloned: Vec<Vec<T>> = std::thread::scope(|scope| {
        let handles: Vec<_> = segments
            .iter()
            .map(|segment| scope.spawn(|| segment.as_slice().to_vec()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("segment copy worker panicked"))
            .collect()
    });
    out.clear();
    out.reserve(cloned.iter().map(Vec::len).sum());
    for chunk in cloned {
        out.extend(chunk);
    }
}

impl<T, C> KdTree<T, C>
where
    T: Clone,
    C: Comparator<T>,
{
    /// The number of points stored in this tree.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether this tree holds no points. Always `false`: empty construction is rejected.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The number of dimensions this tree was built with.
    pub fn dims(&self) -> usize {
        self.dims
    }

    fn eq_all_dims(&self, a: &T, b: &T) -> bool {
        (0..self.dims).all(|d| self.comparator.compare(a, b, d) == Ordering::Equal)
    }

    /// Whether any stored value compares equal to `q` across all dimensions.
    pub fn contains(&self, q: &T) -> bool {
        self.for_each_matching(q, |_| true)
    }

    /// Returns every stored value that compares equal to `q` across all dimensions, with
    /// multiplicity preserved.
    pub fn get(&self, q: &T) -> Vec<T> {
        let mut out = Vec::new();
        self.for_each_matching(q, |v| {
            out.push(v.clone());
            false
        });
        out
    }

    /// Visits every stored value equal to `q` across all dimensions, calling `f` on each. `f`
    /// returns `true` to cancel early. The method itself returns `true` iff `f` ever did.
    pub fn for_each_matching<F: FnMut(&T) -> bool>(&self, q: &T, mut f: F) -> bool {
        self.for_each_matching_range(q, 0, self.values.len(), 0, &mut f)
    }

    fn for_each_matching_range<F: FnMut(&T) -> bool>(
        &self,
        q: &T,
        l: usize,
        r: usize,
        d: usize,
        f: &mut F,
    ) -> bool {
        if l >= r {
            return false;
        }
        let m = median_index(l, r);
        if self.eq_all_dims(q, &self.values[m]) && f(&self.values[m]) {
            return true;
        }
        let c = self.comparator.compare(q, &self.values[m], d);
        let next_d = (d + 1) % self.dims;
        if c != Ordering::Less && self.for_each_matching_range(q, m + 1, r, next_d, f) {
            return true;
        }
        if (c == Ordering::Less || (c == Ordering::Equal && self.dirty[m]))
            && self.for_each_matching_range(q, l, m, next_d, f)
        {
            return true;
        }
        false
    }

    /// Visits every value in array order. Cancels early if `f` returns `true`; returns whether it
    /// did.
    pub fn for_each<F: FnMut(&T) -> bool>(&self, mut f: F) -> bool {
        for v in &self.values {
            if f(v) {
                return true;
            }
        }
        false
    }

    /// Returns every stored value, in array order.
    pub fn get_all(&self) -> Vec<T> {
        self.values.clone()
    }

    fn in_bounds(&self, node: &T, lo: Option<&T>, hi: Option<&T>, hi_inclusive: bool) -> bool {
        for d in 0..self.dims {
            if let Some(lo_v) = lo {
                if self.comparator.compare(node, lo_v, d) == Ordering::Less {
                    return false;
                }
            }
            if let Some(hi_v) = hi {
                let c = self.comparator.compare(node, hi_v, d);
                if hi_inclusive {
                    if c == Ordering::Greater {
                        return false;
                    }
                } else if c != Ordering::Less {
                    return false;
                }
            }
        }
        true
    }

    /// Visits every value within the axis-aligned box `[lo, hi]` (or `[lo, hi)` on the upper
    /// bound when `hi_inclusive` is `false`). Either bound may be absent, meaning unbounded on
    /// every dimension. If `lo[d] > hi[d]` on any dimension, returns immediately with no callback
    /// invocations. Returns `true` iff `f` ever returned `true`.
    pub fn range_for_each<F: FnMut(&T) -> bool>(
        &self,
        mut f: F,
        lo: Option<&T>,
        hi: Option<&T>,
        hi_inclusive: bool,
    ) -> bool {
        if let (Some(lo_v), Some(hi_v)) = (lo, hi) {
            for d in 0..self.dims {
                if self.comparator.compare(lo_v, hi_v, d) == Ordering::Greater {
                    return false;
                }
            }
        }
        self.range_for_each_range(lo, hi, hi_inclusive, 0, self.values.len(), 0, &mut f)
    }

    fn range_for_each_range<F: FnMut(&T) -> bool>(
        &self,
        lo: Option<&T>,
        hi: Option<&T>,
        hi_inclusive: bool,
        l: usize,
        r: usize,
        d: usize,
        f: &mut F,
    ) -> bool {
        if l >= r {
            return false;
        }
        let m = median_index(l, r);
        let node = &self.values[m];
        if self.in_bounds(node, lo, hi, hi_inclusive) && f(node) {
            return true;
        }
        let next_d = (d + 1) % self.dims;

        let descend_right = match hi {
            None => true,
            Some(hi_v) => self.comparator.compare(hi_v, node, d) != Ordering::Less,
        };
        if descend_right && self.range_for_each_range(lo, hi, hi_inclusive, m + 1, r, next_d, f) {
            return true;
        }

        let hi_eq =
            matches!(hi, Some(hi_v) if self.comparator.compare(hi_v, node, d) == Ordering::Equal);
        let descend_left = match lo {
            None => true,
            Some(lo_v) => self.comparator.compare(lo_v, node, d) != Ordering::Greater,
        } || (self.dirty[m] && hi_eq);
        if descend_left && self.range_for_each_range(lo, hi, hi_inclusive, l, m, next_d, f) {
            return true;
        }
        false
    }

    /// Same traversal as [`Self::range_for_each`], returning the first match encountered (no
    /// ordering guarantee across values).
    pub fn try_get_first(&self, lo: Option<&T>, hi: Option<&T>, hi_inclusive: bool) -> Option<T> {
        let mut found = None;
        self.range_for_each(
            |v| {
                found = Some(v.clone());
                true
            },
            lo,
            hi,
            hi_inclusive,
        );
        found
    }
}

impl<T, C> KdTree<T, C>
where
    T: Clone,
    C: Metric<T>,
{
    /// Returns the stored value nearest to `q` under the tree's metric, along with the squared
    /// distance, or `None` if the tree is empty (which cannot currently happen: construction
    /// rejects empty input).
    pub fn nearest_neighbor(&self, q: &T) -> Option<(T, f64)> {
        if self.values.is_empty() {
            return None;
        }
        let mut best: Option<(usize, f64)> = None;
        self.nearest_neighbor_range(q, 0, self.values.len(), 0, &mut best);
        best.map(|(idx, dist)| (self.values[idx].clone(), dist))
    }

    fn nearest_neighbor_range(
        &self,
        q: &T,
        l: usize,
        r: usize,
        d: usize,
        best: &mut Option<(usize, f64)>,
    ) {
        if l >= r {
            return;
        }
        let m = median_index(l, r);
        let dist = self.comparator.distance_sq(q, &self.values[m], self.dims);
        if best.as_ref().is_none_or(|&(_, bd)| dist < bd) {
            *best = Some((m, dist));
        }

        let c = self.comparator.compare(q, &self.values[m], d);
        let next_d = (d + 1) % self.dims;

        if c == Ordering::Equal && self.dirty[m] {
            // Duplicates of the pivot may sit on either side; both are "near", neither is
            // prunable against the other.
            self.nearest_neighbor_range(q, m + 1, r, next_d, best);
            self.nearest_neighbor_range(q, l, m, next_d, best);
            return;
        }

        let (near, far) = if c != Ordering::Less {
            ((m + 1, r), (l, m))
        } else {
            ((l, m), (m + 1, r))
        };
        self.nearest_neighbor_range(q, near.0, near.1, next_d, best);

        let axis = self.comparator.coord(&self.values[m], d) - self.comparator.coord(q, d);
        let axis_sq = axis * axis;
        if best.as_ref().is_none_or(|&(_, bd)| axis_sq < bd) {
            self.nearest_neighbor_range(q, far.0, far.1, next_d, best);
        }
    }
}
