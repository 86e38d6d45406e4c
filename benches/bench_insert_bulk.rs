#[path = "shared.rs"]
mod shared;
use shared::*;

use criterion::{criterion_group, Criterion};
use kdcascade::bkd_tree::BkdTree;
use std::hint::black_box;

fn bench_insert_bulk_bkdtree_empty(_c: &mut Criterion) {
    let points = generate_2d_data(BENCH_NUM_INSERT);
    let mut cc = configure_criterion();
    cc.bench_function("insert_bulk_bkdtree_empty", |b| {
        b.iter_with_setup(
            || (BkdTree::new(2, metric_2d(), BENCH_BLOCK_SIZE, 1).unwrap(), points.clone()),
            |(tree, points)| {
                black_box(tree.insert_bulk(points).unwrap());
            },
        )
    });
}

fn bench_insert_bulk_bkdtree_preloaded(_c: &mut Criterion) {
    let preload = generate_2d_data(BENCH_NUM_INSERT);
    let extra = generate_2d_data(BENCH_NUM_INSERT / 4);
    let mut cc = configure_criterion();
    cc.bench_function("insert_bulk_bkdtree_preloaded", |b| {
        b.iter_with_setup(
            || {
                let tree = BkdTree::new(2, metric_2d(), BENCH_BLOCK_SIZE, 1).unwrap();
                tree.insert_bulk(preload.clone()).unwrap();
                (tree, extra.clone())
            },
            |(tree, extra)| {
                black_box(tree.insert_bulk(extra).unwrap());
            },
        )
    });
}

criterion_group!(benches, bench_insert_bulk_bkdtree_empty, bench_insert_bulk_bkdtree_preloaded);
