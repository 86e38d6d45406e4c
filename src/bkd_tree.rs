//! ## Growing BKD-tree
//!
//! `BkdTree<T, C>` is the cascade of static [`KdTree`]s this crate is named for: a small base
//! block absorbs new values directly, and once it fills, its contents are folded into a sparse,
//! indexed collection of KD-trees `levels[0..32]` where `levels[i]`, if present, holds exactly
//! `block_size * 2^i` points. Filling the base again and finding `levels[0]` occupied merges the
//! two `block_size`-sized runs into `2 * block_size` points and tries to place them at
//! `levels[1]`, carrying further if that is occupied too — the same ripple a binary counter goes
//! through when incrementing past a run of set bits. This keeps every rebuild cost amortized
//! logarithmic in the number of insertions instead of rebuilding the whole structure each time.
//!
//! Unlike this crate's static `KdTree`, mutation here goes through `&self` rather than `&mut
//! self`: the base block and levels live behind an internal [`Mutex`], and a separate
//! [`AtomicUsize`] tracks how many read traversals are currently in flight. Queries bump it for
//! their duration; `insert` and `insert_bulk` check it first and fail fast with
//! [`CascadeError::ConcurrentModification`] instead of blocking on the mutex when a traversal is
//! active. This is the "track a counter and fail" policy from the design notes, chosen over
//! silently blocking until the traversal completes.
//!
//! Queries only hold the mutex long enough to snapshot the base block and clone the `Arc`
//! handles to the occupied levels; the user callback then runs with the lock released. Levels are
//! `Arc`-wrapped (never mutated once built) so cloning a handle is cheap and holding it past the
//! lock is safe. Without this, a callback that re-enters the same tree (even just `len()`) would
//! deadlock on `Mutex`'s non-reentrant lock.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::comparator::{Comparator, Metric};
use crate::errors::CascadeError;
use crate::kd_tree::{KdTree, KdTreeConfig};

/// The fixed cap on how many doubling levels a `BkdTree` may grow. `levels[i]` holds
/// `block_size * 2^i` points, so level 31 alone would require `block_size * 2^31` points —
/// comfortably unreachable in practice, and a safety net against runaway growth either way.
const MAX_LEVELS: usize = 32;

struct BkdState<T, C> {
    base: Vec<T>,
    levels: Vec<Option<Arc<KdTree<T, C>>>>,
}

/// A growing multidimensional point index built from a base block plus a binary-counter cascade
/// of static [`KdTree`]s.
///
/// See the module documentation for the growth policy and concurrency model.
pub struct BkdTree<T, C> {
    dims: usize,
    comparator: C,
    block_size: usize,
    max_threads: usize,
    parallel_threshold: usize,
    iterating: AtomicUsize,
    state: Mutex<BkdState<T, C>>,
}

/// `BkdTree<T, M>` where `M` is a [`Metric`] — the reader-facing name for the nearest-neighbor
/// capable variant described in the crate's external interface.
pub type MetricBkdTree<T, M> = BkdTree<T, M>;

impl<T, C> BkdTree<T, C>
where
    T: Clone + Send,
    C: Comparator<T> + Clone + Sync,
{
    /// Builds an empty `BkdTree` with the given base block capacity.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::InvalidArgument`] if `dims == 0` or `block_size < 2`.
    pub fn new(dims: usize, comparator: C, block_size: usize, max_threads: usize) -> Result<Self, CascadeError> {
        let config = KdTreeConfig {
            max_threads,
            ..KdTreeConfig::default()
        };
        Self::with_config(dims, comparator, block_size, config)
    }

    /// As [`Self::new`], with full control over the parallel build policy used whenever a level
    /// is (re)built.
    pub fn with_config(
        dims: usize,
        comparator: C,
        block_size: usize,
        config: KdTreeConfig,
    ) -> Result<Self, CascadeError> {
        if dims == 0 {
            return Err(CascadeError::InvalidArgument {
                reason: "dims must be >= 1".to_string(),
            });
        }
        if block_size < 2 {
            return Err(CascadeError::InvalidArgument {
                reason: "block_size must be >= 2".to_string(),
            });
        }
        Ok(BkdTree {
            dims,
            comparator,
            block_size,
            max_threads: config.max_threads,
            parallel_threshold: config.parallel_threshold,
            iterating: AtomicUsize::new(0),
            state: Mutex::new(BkdState {
                base: Vec::with_capacity(block_size),
                levels: (0..MAX_LEVELS).map(|_| None).collect(),
            }),
        })
    }

    fn check_not_iterating(&self) -> Result<(), CascadeError> {
        if self.iterating.load(AtomicOrdering::Acquire) != 0 {
            return Err(CascadeError::ConcurrentModification);
        }
        Ok(())
    }

    /// Simulates the binary-counter occupancy transition of one carry against a plain `bool`
    /// array mirroring `state.levels`, without touching any real `KdTree`. Used to validate that
    /// a whole insert/bulk-insert will fit before committing any mutation, so a
    /// [`CascadeError::CapacityExceeded`] never leaves the base block half-consumed.
    fn simulate_carry(occupied: &mut [bool]) -> Result<(), CascadeError> {
        let mut level = 0;
        loop {
            if level >= occupied.len() {
                return Err(CascadeError::CapacityExceeded { requested_level: level });
            }
            if occupied[level] {
                occupied[level] = false;
                level += 1;
            } else {
                occupied[level] = true;
                return Ok(());
            }
        }
    }

    /// Folds `carry` (always exactly `block_size * 2^0` points at the first call) into
    /// `state.levels`, merging and carrying further whenever the target level is already occupied.
    fn carry_propagate(&self, state: &mut BkdState<T, C>, mut carry: Vec<T>) -> Result<(), CascadeError> {
        let mut level = 0;
        loop {
            if level >= state.levels.len() {
                return Err(CascadeError::CapacityExceeded { requested_level: level });
            }
            match state.levels[level].take() {
                None => {
                    debug!("placing {} points at level {}", carry.len(), level);
                    let config = KdTreeConfig {
                        max_threads: self.max_threads,
                        parallel_threshold: self.parallel_threshold,
                    };
                    let tree = KdTree::with_config(self.dims, carry, self.comparator.clone(), config)?;
                    state.levels[level] = Some(Arc::new(tree));
                    return Ok(());
                }
                Some(existing) => {
                    debug!("carrying {} points past level {}", carry.len(), level);
                    let mut merged = existing.get_all();
                    merged.extend(carry);
                    carry = merged;
                    level += 1;
                }
            }
        }
    }

    /// Inserts a single value, absorbing it into the base block or triggering a carry-propagation
    /// cascade if the base block is already full.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::ConcurrentModification`] if a read traversal is in progress, or
    /// [`CascadeError::CapacityExceeded`] if carrying would need a level past 31.
    pub fn insert(&self, value: T) -> Result<(), CascadeError> {
        self.check_not_iterating()?;
        let mut state = self.state.lock().expect("kdcascade: BkdTree mutex poisoned");
        if state.base.len() < self.block_size {
            state.base.push(value);
            return Ok(());
        }
        let mut occupied: Vec<bool> = state.levels.iter().map(Option::is_some).collect();
        Self::simulate_carry(&mut occupied)?;
        let carry = std::mem::replace(&mut state.base, Vec::with_capacity(self.block_size));
        state.base.push(value);
        self.carry_propagate(&mut state, carry)
    }

    /// Inserts many values at once. Equivalent in result to inserting them one at a time, but
    /// batches the carry-propagation cascade per full block instead of rebuilding trees on every
    /// single insertion.
    ///
    /// # Errors
    ///
    /// As [`Self::insert`].
    pub fn insert_bulk<I: IntoIterator<Item = T>>(&self, new_values: I) -> Result<(), CascadeError> {
        self.check_not_iterating()?;
        let mut state = self.state.lock().expect("kdcascade: BkdTree mutex poisoned");
        let incoming: Vec<T> = new_values.into_iter().collect();
        let combined_len = state.base.len() + incoming.len();
        let carries_needed = combined_len / self.block_size;

        // Validate the whole cascade fits before any real mutation, so a capacity failure never
        // leaves the base block half-consumed.
        let mut occupied: Vec<bool> = state.levels.iter().map(Option::is_some).collect();
        for _ in 0..carries_needed {
            Self::simulate_carry(&mut occupied)?;
        }

        let mut pool: Vec<T> = std::mem::take(&mut state.base);
        pool.extend(incoming);

        info!("bulk inserting into BkdTree: pool size {}", pool.len());
        while pool.len() >= self.block_size {
            let carry: Vec<T> = pool.drain(0..self.block_size).collect();
            self.carry_propagate(&mut state, carry)?;
        }
        state.base = pool;
        Ok(())
    }

    /// The total number of points currently stored, across the base block and every occupied
    /// level.
    pub fn len(&self) -> usize {
        let state = self.state.lock().expect("kdcascade: BkdTree mutex poisoned");
        state.base.len() + state.levels.iter().flatten().map(|level| level.len()).sum::<usize>()
    }

    /// Clones the base block and the `Arc` handles of every occupied level while the lock is
    /// held, then releases it. Callers drive the actual traversal (and any user callback) against
    /// this snapshot, since holding the mutex across a callback would deadlock on re-entrant
    /// reads of the same tree.
    fn snapshot(&self) -> (Vec<T>, Vec<Arc<KdTree<T, C>>>) {
        let state = self.state.lock().expect("kdcascade: BkdTree mutex poisoned");
        let base = state.base.clone();
        let levels = state.levels.iter().flatten().cloned().collect();
        (base, levels)
    }

    /// Whether this tree holds no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn eq_all_dims(&self, a: &T, b: &T) -> bool {
        (0..self.dims).all(|d| self.comparator.compare(a, b, d) == Ordering::Equal)
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

    /// Whether any stored value compares equal to `q` across all dimensions.
    pub fn contains(&self, q: &T) -> bool {
        self.for_each_matching(q, |_| true)
    }

    /// Returns every stored value equal to `q` across all dimensions, with multiplicity
    /// preserved, fanning out over the base block and then each occupied level in index order.
    pub fn get(&self, q: &T) -> Vec<T> {
        let mut out = Vec::new();
        self.for_each_matching(q, |v| {
            out.push(v.clone());
            false
        });
        out
    }

    /// Visits every stored value equal to `q`, base block first and then each occupied level in
    /// index order. `f` returns `true` to cancel early; the method returns `true` iff it did.
    pub fn for_each_matching<F: FnMut(&T) -> bool>(&self, q: &T, mut f: F) -> bool {
        self.iterating.fetch_add(1, AtomicOrdering::AcqRel);
        let (base, levels) = self.snapshot();
        let result = (|| {
            for v in &base {
                if self.eq_all_dims(v, q) && f(v) {
                    return true;
                }
            }
            for level in &levels {
                if level.for_each_matching(q, &mut f) {
                    return true;
                }
            }
            false
        })();
        self.iterating.fetch_sub(1, AtomicOrdering::AcqRel);
        result
    }

    /// Visits every stored value, base block first and then each occupied level in index order.
    pub fn for_each<F: FnMut(&T) -> bool>(&self, mut f: F) -> bool {
        self.iterating.fetch_add(1, AtomicOrdering::AcqRel);
        let (base, levels) = self.snapshot();
        let result = (|| {
            for v in &base {
                if f(v) {
                    return true;
                }
            }
            for level in &levels {
                if level.for_each(&mut f) {
                    return true;
                }
            }
            false
        })();
        self.iterating.fetch_sub(1, AtomicOrdering::AcqRel);
        result
    }

    /// Returns every stored value, base block first and then each occupied level in index order.
    pub fn get_all(&self) -> Vec<T> {
        let mut out = Vec::new();
        self.for_each(|v| {
            out.push(v.clone());
            false
        });
        out
    }

    /// Visits every value within the axis-aligned box `[lo, hi]` (or `[lo, hi)` on the upper
    /// bound when `hi_inclusive` is `false`), fanning out over the base block and every occupied
    /// level. Returns immediately with no callback invocations if `lo[d] > hi[d]` on any
    /// dimension.
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
        self.iterating.fetch_add(1, AtomicOrdering::AcqRel);
        let (base, levels) = self.snapshot();
        let result = (|| {
            for v in &base {
                if self.in_bounds(v, lo, hi, hi_inclusive) && f(v) {
                    return true;
                }
            }
            for level in &levels {
                if level.range_for_each(&mut f, lo, hi, hi_inclusive) {
                    return true;
                }
            }
            false
        })();
        self.iterating.fetch_sub(1, AtomicOrdering::AcqRel);
        result
    }

    /// Same traversal as [`Self::range_for_each`], returning the first match encountered (no
    /// ordering guarantee across values or levels).
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

impl<T, C> BkdTree<T, C>
where
    T: Clone + Send,
    C: Metric<T> + Clone + Sync,
{
    /// Returns the stored value nearest to `q` under the tree's metric, along with the squared
    /// distance, or `None` if the tree is empty.
    ///
    /// Each occupied level already prunes its own search internally; this combines the base
    /// block's linear scan with one candidate per level and keeps the closest.
    pub fn nearest_neighbor(&self, q: &T) -> Option<(T, f64)> {
        self.iterating.fetch_add(1, AtomicOrdering::AcqRel);
        let (base, levels) = self.snapshot();
        let result = {
            let mut best: Option<(T, f64)> = None;
            for v in &base {
                let dist = self.comparator.distance_sq(q, v, self.dims);
                if best.as_ref().is_none_or(|&(_, bd)| dist < bd) {
                    best = Some((v.clone(), dist));
                }
            }
            for level in &levels {
                if let Some((candidate, dist)) = level.nearest_neighbor(q) {
                    if best.as_ref().is_none_or(|&(_, bd)| dist < bd) {
                        best = Some((candidate, dist));
                    }
                }
            }
            best
        };
        self.iterating.fetch_sub(1, AtomicOrdering::AcqRel);
        result
    }
}
