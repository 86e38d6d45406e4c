//! ## Parallel build coordinator
//!
//! `KdTree::Build` may fork a recursive subtree build onto a worker thread when the subrange is
//! large enough and the configured thread budget is not exhausted. This is a classic fork-join
//! with explicit, counter-based throttling: a single atomic counts live workers, forking only
//! happens via compare-and-swap, and every forked task is joined before its parent returns (via
//! `std::thread::scope`, so no reads ever observe a partially built subtree).
//!
//! The corpus this crate is grounded on has no existing parallel-build code to imitate (none of
//! its space-partitioning trees fork construction across threads); this module is written in the
//! "one atomic counter, CAS loop, back off to sequential recursion when saturated" style the
//! design notes call for, using only `std::thread` and `std::sync::atomic` — the throttled,
//! user-controlled fork/join the design calls for does not map onto a general-purpose work-stealing
//! pool.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Default minimum subrange size for forking a recursive build task.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Throttles how many concurrent `Build` tasks may be in flight at once.
pub(crate) struct ParallelCoordinator {
    active: AtomicUsize,
    max_threads: usize,
    threshold: usize,
}

impl ParallelCoordinator {
    pub(crate) fn new(max_threads: usize, threshold: usize) -> Self {
        ParallelCoordinator {
            active: AtomicUsize::new(1), // the calling thread itself counts as one worker
            max_threads: max_threads.max(1),
            threshold,
        }
    }

    /// Whether a subrange of this size is even eligible to fork, ignoring current load.
    pub(crate) fn worth_forking(&self, subrange_len: usize) -> bool {
        self.max_threads > 1 && subrange_len >= self.threshold
    }

    /// Attempts to reserve a worker slot. On success, the caller must call [`Self::release`]
    /// once the forked task (and everything it joins) has completed.
    pub(crate) fn try_acquire(&self) -> bool {
        let mut current = self.active.load(Ordering::Acquire);
        loop {
            if current >= self.max_threads {
                return false;
            }
            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    pub(crate) fn release(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worth_forking_respects_threshold_and_thread_cap() {
        let coord = ParallelCoordinator::new(4, 100);
        assert!(!coord.worth_forking(50));
        assert!(coord.worth_forking(100));

        let sequential = ParallelCoordinator::new(1, 10);
        assert!(!sequential.worth_forking(1_000_000));
    }

    #[test]
    fn test_acquire_release_throttles_at_cap() {
        let coord = ParallelCoordinator::new(2, 0);
        // One slot is implicitly held by the "calling thread"; only one more fits.
        assert!(coord.try_acquire());
        assert!(!coord.try_acquire());
        coord.release();
        assert!(coord.try_acquire());
    }
}
