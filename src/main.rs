use kdcascade::bkd_tree::BkdTree;
use kdcascade::comparator::EuclideanMetric;
use kdcascade::kd_tree::KdTree;
use tracing::info;

type Point = (f64, f64);

fn metric() -> EuclideanMetric<fn(&Point, usize) -> f64> {
    EuclideanMetric::new((|p: &Point, d: usize| if d == 0 { p.0 } else { p.1 }) as fn(&Point, usize) -> f64)
}

fn main() {
    test_kd_tree();
    test_bkd_tree();
}

fn test_kd_tree() {
    println!("{}", "=".repeat(100));
    println!("KdTree Example");

    let points = vec![
        (1.0, 2.0),
        (3.0, 4.0),
        (5.0, 6.0),
        (7.0, 8.0),
        (9.0, 10.0),
    ];
    info!("building KdTree over {} points", points.len());
    let tree = KdTree::new(2, points, metric(), 1).expect("non-empty construction");

    let query = (2.0, 3.0);
    let (nearest, dist_sq) = tree.nearest_neighbor(&query).expect("tree is non-empty");
    println!("Nearest point to {query:?}: {nearest:?} (dist_sq = {dist_sq})");

    let mut in_range = Vec::new();
    tree.range_for_each(
        |p| {
            in_range.push(*p);
            false
        },
        Some(&(0.0, 0.0)),
        Some(&(6.0, 7.0)),
        true,
    );
    println!("Points within [(0, 0), (6, 7)]: {in_range:?}");
}

fn test_bkd_tree() {
    println!("{}", "=".repeat(100));
    println!("BkdTree Example");

    let tree = BkdTree::new(2, metric(), 4, 1).expect("valid block size");
    info!("growing BkdTree past its first base block");
    for i in 0..12 {
        tree.insert((i as f64, (i * 2) as f64))
            .expect("tree is not mid-traversal");
    }
    println!("BkdTree now holds {} points", tree.len());

    let query = (5.0, 10.0);
    let (nearest, dist_sq) = tree.nearest_neighbor(&query).expect("tree is non-empty");
    println!("Nearest point to {query:?}: {nearest:?} (dist_sq = {dist_sq})");

    let mut bulk_points = Vec::new();
    for i in 12..40 {
        bulk_points.push((i as f64, (i * 2) as f64));
    }
    tree.insert_bulk(bulk_points).expect("tree is not mid-traversal");
    println!("After bulk insert, BkdTree holds {} points", tree.len());
}
