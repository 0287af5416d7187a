//! Performance benchmarks for overlap and traversal queries.
//!
//! Run with: `cargo bench --bench overlap`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Pairwise overlap | <50µs | Sorted-set intersection |
//! | Aggregate coverage | <1ms | 20 owned editions |
//! | Duplicate groups | <100ms | 1000-edition catalog |
//! | Shortest path | <5ms | Chain of 1000 editions |
//! | Catalog build | <200ms | 1000 editions from raw rows |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use edition_graph::{
    BuiltCatalog, CatalogSnapshot, Connection, Edition, EditionGraph, EditionId, IssueId, IssueIndex,
    OverlapEngine, PathFinder, PurchasePlanner,
};

/// Editions cover sliding 50-issue windows, 10 issues apart, chained by
/// `leads_to`. Every fifth edition gets a same-title reprint.
fn make_catalog(size: usize) -> (EditionGraph, IssueIndex) {
    let mut editions = Vec::with_capacity(size + size / 5);
    let mut connections = Vec::with_capacity(size);
    for i in 0..size {
        let start = i * 10 + 1;
        let issues: Vec<IssueId> = (start..start + 50)
            .map(|n| IssueId::new("Fantastic Four", n.to_string(), false))
            .collect();
        if i % 5 == 0 {
            editions.push(Edition::new(format!("r{i}"), format!("Volume {i}"), issues.clone()));
        }
        editions.push(Edition::new(format!("e{i}"), format!("Volume {i}"), issues));
        if i > 0 {
            connections.push(Connection::leads_to(format!("e{}", i - 1), format!("e{i}"), 0.8));
        }
    }
    let (index, _) = IssueIndex::build(&editions);
    let (graph, _) = EditionGraph::build(editions, connections);
    (graph, index)
}

fn make_snapshot(size: usize) -> CatalogSnapshot {
    let editions: Vec<_> = (0..size)
        .map(|i| {
            json!({
                "id": format!("e{i}"),
                "title": format!("Fantastic Four Vol. {i}"),
                "issues_collected": format!("FF #{}-{}, Annual #{}", i * 10 + 1, i * 10 + 50, i + 1),
                "print_status": "in_print",
                "cover_price": "$49.99"
            })
        })
        .collect();
    let connections: Vec<_> = (1..size)
        .map(|i| json!({"source_id": format!("e{}", i - 1), "target_id": format!("e{i}"), "strength": 8}))
        .collect();
    serde_json::from_value(json!({
        "version": 1,
        "strength_scale": "store",
        "editions": editions,
        "connections": connections
    }))
        .expect("synthetic snapshot")
}

fn id(i: usize) -> EditionId {
    EditionId::new(format!("e{i}"))
}

fn bench_pairwise(c: &mut Criterion) {
    let (graph, index) = make_catalog(100);
    let engine = OverlapEngine::new(&graph, &index);

    c.bench_function("pairwise_overlap", |b| {
        b.iter(|| engine.pairwise(black_box(&id(10)), black_box(&id(13))))
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let (graph, index) = make_catalog(100);
    let engine = OverlapEngine::new(&graph, &index);

    let mut group = c.benchmark_group("aggregate");
    for owned_count in [1, 5, 20] {
        let owned: Vec<EditionId> = (0..owned_count).map(|i| id(40 + i)).collect();
        group.throughput(Throughput::Elements(owned_count as u64));
        group.bench_with_input(BenchmarkId::new("owned", owned_count), &owned, |b, owned| {
            b.iter(|| engine.aggregate(black_box(&id(50)), black_box(owned)))
        });
    }
    group.finish();
}

fn bench_duplicate_groups(c: &mut Criterion) {
    let mut group = c.benchmark_group("duplicate_groups");
    group.sample_size(20);
    for size in [100, 1000] {
        let (graph, index) = make_catalog(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("editions", size), &size, |b, _| {
            b.iter(|| {
                let groups = OverlapEngine::new(&graph, &index).duplicate_groups(0.9).unwrap();
                assert!(!groups.is_empty());
                groups
            })
        });
    }
    group.finish();
}

fn bench_shortest_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("shortest_path");
    for size in [100, 1000] {
        let (graph, _) = make_catalog(size);
        let finder = PathFinder::new(&graph);
        group.bench_with_input(BenchmarkId::new("chain", size), &size, |b, size| {
            b.iter(|| {
                let outcome = finder.shortest_path(black_box(&id(0)), black_box(&id(size - 1))).unwrap();
                assert!(outcome.is_found());
                outcome
            })
        });
    }
    group.finish();
}

fn bench_purchase_plan(c: &mut Criterion) {
    let (graph, index) = make_catalog(200);
    let planner = PurchasePlanner::new(&graph, &index, 0.9);
    let path: Vec<EditionId> = (0..50).map(id).collect();
    let owned: Vec<EditionId> = (0..50).step_by(3).map(id).collect();

    c.bench_function("purchase_plan_50", |b| {
        b.iter(|| planner.plan(black_box(&path), black_box(&owned)))
    });
}

fn bench_catalog_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog_build");
    group.sample_size(20);
    for size in [100, 1000] {
        let snapshot = make_snapshot(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("editions", size), &snapshot, |b, snapshot| {
            b.iter(|| BuiltCatalog::build(black_box(snapshot)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_pairwise,
    bench_aggregate,
    bench_duplicate_groups,
    bench_shortest_path,
    bench_purchase_plan,
    bench_catalog_build,
);
criterion_main!(benches);
