//! ## Custom Errors for kdcascade
//!
//! This module defines the error kinds raised at the boundary of the indexing engine. Errors are
//! always surfaced synchronously from the call that caused them; no partial mutation is left
//! behind (see the crate-level documentation for the exact guarantee per operation).

use std::error::Error;
use std::fmt;

/// Errors raised by [`crate::kd_tree::KdTree`] and [`crate::bkd_tree::BkdTree`].
#[derive(Debug)]
pub enum CascadeError {
    /// A constructor or operation received an argument outside its accepted domain:
    /// a non-positive dimension count, an empty value collection passed to static tree
    /// construction, a `block_size` below 2, a dimension index out of range raised by a
    /// user-supplied comparator or metric and propagated unchanged, or similar.
    InvalidArgument {
        /// Human-readable explanation of what was invalid.
        reason: String,
    },
    /// A [`crate::bkd_tree::BkdTree`] insertion would need a level past the fixed cap of 32.
    CapacityExceeded {
        /// The level index that would have been required.
        requested_level: usize,
    },
    /// A mutating call arrived on a [`crate::bkd_tree::BkdTree`] while a read traversal over it
    /// was still in progress.
    ConcurrentModification,
    /// A constructed [`crate::segment::Segment`] would read past the end of its backing slice.
    SegmentShape {
        /// The requested starting offset.
        offset: usize,
        /// The requested length.
        length: usize,
        /// The length of the backing slice actually available.
        backing_len: usize,
    },
}

impl fmt::Display for CascadeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CascadeError::InvalidArgument { reason } => {
                write!(f, "invalid argument: {reason}")
            }
            CascadeError::CapacityExceeded { requested_level } => {
                write!(
                    f,
                    "capacity exceeded: level {requested_level} is past the maximum of 32"
                )
            }
            CascadeError::ConcurrentModification => {
                write!(
                    f,
                    "concurrent modification: a mutation was attempted while a traversal was active"
                )
            }
            CascadeError::SegmentShape {
                offset,
                length,
                backing_len,
            } => {
                write!(
                    f,
                    "invalid segment: offset {offset} + length {length} exceeds backing length {backing_len}"
                )
            }
        }
    }
}

impl Error for CascadeError {}
