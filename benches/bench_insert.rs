#[path = "shared.rs"]
mod shared;
use shared::*;

use criterion::{criterion_group, Criterion};
use kdcascade::bkd_tree::BkdTree;
use kdcascade::kd_tree::KdTree;
use std::hint::black_box;

fn bench_kdtree_build(_c: &mut Criterion) {
    let points = generate_2d_data(BENCH_NUM_INSERT);
    let mut cc = configure_criterion();
    cc.bench_function("build_kdtree", |b| {
        b.iter_with_setup(
            || points.clone(),
            |points| {
                black_box(KdTree::new(2, points, metric_2d(), 1).unwrap());
            },
        )
    });
}

fn bench_bkdtree_single_insert(_c: &mut Criterion) {
    let points = generate_2d_data(BENCH_NUM_INSERT);
    let to_insert = points[points.len() - 1];
    let base_points = &points[..points.len() - 1];
    let mut cc = configure_criterion();
    cc.bench_function("insert_single_bkdtree", |b| {
        b.iter_with_setup(
            || {
                let tree = BkdTree::new(2, metric_2d(), BENCH_BLOCK_SIZE, 1).unwrap();
                for &p in base_points {
                    tree.insert(p).unwrap();
                }
                tree
            },
            |tree| {
                black_box(tree.insert(to_insert).unwrap());
            },
        )
    });
}

criterion_group!(benches, bench_kdtree_build, bench_bkdtree_single_insert);
