//! kdcascade is an in-memory multidimensional point index: a balanced, static [`kd_tree::KdTree`]
//! for a fixed point set, and a growing [`bkd_tree::BkdTree`] that absorbs new points by cascading
//! a binary counter of static KD-trees.
//!
//! Every tree is generic over the stored value type and over a [`comparator::Comparator`] or
//! [`comparator::Metric`] capability the caller supplies; see the [`comparator`] module for the
//! built-in [`comparator::EuclideanMetric`] and the trait-based extension points.

pub mod bkd_tree;
pub mod comparator;
pub mod errors;
pub mod kd_tree;
mod logging;
mod parallel;
pub mod segment;
