//! Integration tests for the static KdTree.


use kdcascade::errors::CascadeError;
use kdcascade::kd_tree::KdTree;
use shared::{common_points_2d, distance_2d, metric_2d, Pt2};

#[test]
fn test_build_query_and_nearest_neighbor() {
    let points = common_points_2d();
    let tree = KdTree::new(2, points.clone(), metric_2d(), 1).unwrap();

    assert_eq!(tree.len(), points.len());
    for p in &points {
        assert!(tree.contains(p));
    }

    let target = (35.0, 45.0);
    let (nearest, dist_sq) = tree.nearest_neighbor(&target).unwrap();
    let brute = points
        .iter()
        .map(|p| distance_2d(&target, p).powi(2))
        .fold(f64::INFINITY, f64::min);
    assert!((dist_sq - brute).abs() < 1e-9);
    assert!(points.contains(&nearest));
}

#[test]
fn test_range_query_matches_brute_force() {
    let points = common_points_2d();
    let tree = KdTree::new(2, points.clone(), metric_2d(), 1).unwrap();

    let lo = (20.0, 20.0);
    let hi = (30.0, 30.0);
    let mut found: Vec<Pt2> = Vec::new();
    tree.range_for_each(
        |p| {
            found.push(*p);
            false
        },
        Some(&lo),
        Some(&hi),
        true,
    );
    found.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mut expected: Vec<Pt2> = points
        .into_iter()
        .filter(|p| p.0 >= lo.0 && p.0 <= hi.0 && p.1 >= lo.1 && p.1 <= hi.1)
        .collect();
    expected.sort_by(|a, b| a.partial_cmp(b).unwrap());

    assert_eq!(found, expected);
}

#[test]
fn test_duplicate_points_all_counted() {
    let points = vec![(5.0, 5.0), (5.0, 5.0), (5.0, 5.0), (1.0, 1.0)];
    let tree = KdTree::new(2, points, metric_2d(), 1).unwrap();
    assert_eq!(tree.get(&(5.0, 5.0)).len(), 3);
}

#[test]
fn test_empty_construction_is_rejected() {
    let err = KdTree::new(2, Vec::<Pt2>::new(), metric_2d(), 1).unwrap_err();
    assert!(matches!(err, CascadeError::InvalidArgument { .. }));
}

#[test]
fn test_zero_width_range_returns_no_callback_invocations() {
    let points = common_points_2d();
    let tree = KdTree::new(2, points, metric_2d(), 1).unwrap();

    // lo > hi on the x axis: the range is empty.
    let mut calls = 0;
    let cancelled = tree.range_for_each(
        |_| {
            calls += 1;
            false
        },
        Some(&(90.0, 0.0)),
        Some(&(10.0, 100.0)),
        true,
    );
    assert!(!cancelled);
    assert_eq!(calls, 0);
}

#[test]
fn test_get_all_round_trips_every_point() {
    let points = common_points_2d();
    let tree = KdTree::new(2, points.clone(), metric_2d(), 1).unwrap();
    let mut all = tree.get_all();
    let mut expected = points;
    all.sort_by(|a, b| a.partial_cmp(b).unwrap());
    expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(all, expected);
}
