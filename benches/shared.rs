#![allow(dead_code)]

//! Shared utilities for benchmarks in kdcascade.
//!
//! This module provides common constants and sample data generators used by the
//! Criterion benchmarks in this directory.

use criterion::Criterion;
use kdcascade::comparator::EuclideanMetric;

pub type Pt2 = (f64, f64);

//
// Benchmark Parameters
//
pub const BENCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
pub const BENCH_NUM_INSERT: i32 = 20_000;
pub const BENCH_BLOCK_SIZE: usize = 128;
pub const BENCH_RANGE_RADIUS: f64 = 30.0;

pub fn metric_2d() -> EuclideanMetric<fn(&Pt2, usize) -> f64> {
    EuclideanMetric::new((|p: &Pt2, d: usize| if d == 0 { p.0 } else { p.1 }) as fn(&Pt2, usize) -> f64)
}

/// Deterministic xorshift64* generator so benchmarks do not depend on `rand`.
pub struct XorShift64(u64);

impl XorShift64 {
    pub fn new(seed: u64) -> Self {
        XorShift64(seed | 1)
    }

    pub fn next_unit(&mut self) -> f64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

//
// Data Generation Functions
//
pub fn generate_2d_data(n: i32) -> Vec<Pt2> {
    let mut rng = XorShift64::new(0x2545F4914F6CDD1D);
    (0..n)
        .map(|_| (rng.next_unit() * 1000.0, rng.next_unit() * 1000.0))
        .collect()
}

// Configure Criterion with a timeout for benchmarks
pub fn configure_criterion() -> Criterion {
    Criterion::default().measurement_time(BENCH_TIMEOUT)
}
