//! Integration tests for the growing BkdTree.


use kdcascade::bkd_tree::BkdTree;
use kdcascade::errors::CascadeError;
use shared::{distance_2d, metric_2d, Pt2};

#[test]
fn test_single_inserts_build_up_a_cascade() {
    let tree = BkdTree::new(2, metric_2d(), 8, 1).unwrap();
    let points: Vec<Pt2> = (0..100).map(|i| (i as f64, (i * 3 % 17) as f64)).collect();
    for p in &points {
        tree.insert(*p).unwrap();
    }

    assert_eq!(tree.len(), points.len());
    for p in &points {
        assert!(tree.contains(p));
    }
}

#[test]
fn test_bulk_insert_equivalent_to_sequential() {
    let points: Vec<Pt2> = (0..250).map(|i| ((i % 29) as f64, (i % 13) as f64)).collect();

    let sequential = BkdTree::new(2, metric_2d(), 16, 1).unwrap();
    for p in &points {
        sequential.insert(*p).unwrap();
    }

    let bulk = BkdTree::new(2, metric_2d(), 16, 1).unwrap();
    bulk.insert_bulk(points.clone()).unwrap();

    assert_eq!(sequential.len(), bulk.len());
    assert_eq!(bulk.len(), points.len());
    for p in &points {
        assert!(bulk.contains(p));
    }
}

#[test]
fn test_nearest_neighbor_across_base_and_levels() {
    let tree = BkdTree::new(2, metric_2d(), 8, 1).unwrap();
    let points: Vec<Pt2> = (0..80).map(|i| ((i % 23) as f64, (i % 19) as f64)).collect();
    for p in &points {
        tree.insert(*p).unwrap();
    }

    let target = (10.5, 9.5);
    let (nearest, dist_sq) = tree.nearest_neighbor(&target).unwrap();
    let brute = points
        .iter()
        .map(|p| distance_2d(&target, p).powi(2))
        .fold(f64::INFINITY, f64::min);
    assert!((dist_sq - brute).abs() < 1e-9);
    assert!(points.contains(&nearest));
}

#[test]
fn test_block_size_below_two_rejected() {
    let err = BkdTree::new(2, metric_2d(), 1, 1).unwrap_err();
    assert!(matches!(err, CascadeError::InvalidArgument { .. }));
}

#[test]
fn test_concurrent_modification_detected_during_reentrant_traversal() {
    let tree = BkdTree::new(2, metric_2d(), 4, 1).unwrap();
    for i in 0..6 {
        tree.insert((i as f64, i as f64)).unwrap();
    }

    let mut saw_conflict = false;
    tree.range_for_each(
        |_| {
            saw_conflict = tree.insert((99.0, 99.0)).is_err();
            true
        },
        None,
        None,
        true,
    );
    assert!(saw_conflict);
    // The rejected insert must not have mutated the tree.
    assert!(!tree.contains(&(99.0, 99.0)));
}

#[test]
fn test_count_law_holds_after_mixed_inserts() {
    let tree = BkdTree::new(2, metric_2d(), 8, 1).unwrap();
    let mut total = 0;
    for batch in 0..5 {
        for i in 0..7 {
            tree.insert((batch as f64, i as f64)).unwrap();
            total += 1;
        }
    }
    assert_eq!(tree.len(), total);
}
