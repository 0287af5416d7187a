//! Golden tests for the edition graph.
//!
//! These tests pin the reference catalog answers: overlap, traversal,
//! aggregate coverage and the purchase plan.

use edition_graph::{
    BuiltCatalog, CatalogSnapshot, Connection, ConnectionType, Edition, EditionGraph, EditionId, IssueId,
    IssueIndex, OverlapEngine, PathFinder, PathOutcome, PrintStatus, PurchasePlanner,
};
use serde_json::json;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn ff(n: u32) -> IssueId {
    IssueId::new("Fantastic Four", n.to_string(), false)
}

fn make_edition(id: &str, issues: &[u32]) -> Edition {
    Edition::new(id, id.to_uppercase(), issues.iter().map(|n| ff(*n)).collect())
        .with_print_status(PrintStatus::InPrint)
}

/// A={FF#1,FF#2}, B={FF#1-3}, C={FF#4}; A→B (0.9), B→C (0.5).
fn build_reference() -> (EditionGraph, IssueIndex) {
    let editions = vec![
        make_edition("a", &[1, 2]).with_cover_price(20.0),
        make_edition("b", &[1, 2, 3]).with_cover_price(35.0),
        make_edition("c", &[4]).with_cover_price(15.0),
    ];
    let connections = vec![Connection::leads_to("a", "b", 0.9), Connection::leads_to("b", "c", 0.5)];
    let (index, index_warnings) = IssueIndex::build(&editions);
    let (graph, graph_warnings) = EditionGraph::build(editions, connections);
    assert!(index_warnings.is_empty());
    assert!(graph_warnings.is_empty());
    (graph, index)
}

fn ids(list: &[&str]) -> Vec<EditionId> {
    list.iter().map(|s| EditionId::new(*s)).collect()
}

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 0.01, "expected {expected}, got {actual}");
}

// ─────────────────────────────────────────────────────────────────────────────
// Reference Scenario
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_reference_pairwise_overlap() {
    let (graph, index) = build_reference();
    let overlap = OverlapEngine::new(&graph, &index)
        .pairwise(&EditionId::new("a"), &EditionId::new("b"))
        .unwrap();

    assert_eq!(overlap.shared, vec![ff(1), ff(2)]);
    assert_close(overlap.pct_of_a, 100.0);
    assert_close(overlap.pct_of_b, 66.67);
}

#[test]
fn test_reference_successors_and_path() {
    let (graph, _) = build_reference();
    let finder = PathFinder::new(&graph);

    let next = finder.whats_next(&EditionId::new("a")).unwrap();
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].edition, EditionId::new("b"));
    assert_eq!(next[0].connection_type, ConnectionType::LeadsTo);

    let path = finder.shortest_path(&EditionId::new("a"), &EditionId::new("c")).unwrap();
    assert_eq!(
        path,
        PathOutcome::Found {
            path: ids(&["a", "b", "c"]),
            hops: 2,
        }
    );
}

#[test]
fn test_reverse_route_is_no_path() {
    let (graph, _) = build_reference();
    let outcome = PathFinder::new(&graph)
        .shortest_path(&EditionId::new("c"), &EditionId::new("a"))
        .unwrap();
    assert_eq!(outcome, PathOutcome::NoPath);
}

#[test]
fn test_reference_aggregate() {
    let (graph, index) = build_reference();
    let aggregate = OverlapEngine::new(&graph, &index)
        .aggregate(&EditionId::new("b"), &ids(&["a"]))
        .unwrap();

    assert_close(aggregate.pct_covered, 66.67);
    assert_eq!(aggregate.contributors.len(), 1);
    assert_eq!(aggregate.contributors[0].edition, EditionId::new("a"));
    assert_eq!(aggregate.contributors[0].count, 2);
}

#[test]
fn test_reference_purchase_plan() {
    let (graph, index) = build_reference();
    let plan = PurchasePlanner::new(&graph, &index, 0.9)
        .plan(&ids(&["a", "b", "c"]), &ids(&["a"]))
        .unwrap();

    assert_eq!(plan.owned.len(), 1);
    assert_eq!(plan.owned[0].edition, EditionId::new("a"));
    assert_eq!(plan.partially_owned.len(), 1);
    assert_eq!(plan.partially_owned[0].edition, EditionId::new("b"));
    assert_close(plan.partially_owned[0].coverage_pct, 66.67);
    assert_eq!(plan.unowned.in_print.len(), 1);
    assert_eq!(plan.unowned.in_print[0].edition, EditionId::new("c"));
    assert_eq!(plan.total_cost, 15.0);
    assert!(plan.skippable.is_empty());
}

#[test]
fn test_partially_owned_skippable_only_with_covering_alternative() {
    // D holds FF#3-4, so it supplies the only issue of B not yet owned.
    let editions = vec![
        make_edition("a", &[1, 2]),
        make_edition("b", &[1, 2, 3]),
        make_edition("d", &[3, 4]).with_isbn("9781302900000"),
    ];
    let (index, _) = IssueIndex::build(&editions);
    let (graph, _) = EditionGraph::build(editions, vec![]);
    let planner = PurchasePlanner::new(&graph, &index, 0.6);

    let without = planner.plan(&ids(&["a", "b"]), &ids(&["a"])).unwrap();
    assert!(without.skippable.is_empty());

    let with = planner.plan(&ids(&["a", "b", "d"]), &ids(&["a"])).unwrap();
    assert_eq!(with.skippable.len(), 1);
    assert_eq!(with.skippable[0].edition, EditionId::new("b"));
    assert_eq!(with.skippable[0].covered_by, EditionId::new("d"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Determinism
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_equal_strength_ranked_by_title() {
    let editions = vec![
        Edition::new("hub", "Hub", vec![ff(1)]),
        Edition::new("z-id", "Alpha Flight", vec![ff(2)]),
        Edition::new("a-id", "Zodiac", vec![ff(3)]),
    ];
    let connections = vec![
        Connection::leads_to("hub", "a-id", 0.7),
        Connection::leads_to("hub", "z-id", 0.7),
    ];
    let (graph, _) = EditionGraph::build(editions, connections);
    let next = PathFinder::new(&graph).whats_next(&EditionId::new("hub")).unwrap();
    let titles: Vec<&str> = next.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Alpha Flight", "Zodiac"]);
}

#[test]
fn test_rebuild_is_idempotent() {
    let (g1, _) = build_reference();
    let (g2, _) = build_reference();
    let a = EditionId::new("a");
    let c = EditionId::new("c");
    assert_eq!(
        PathFinder::new(&g1).whats_next(&a).unwrap(),
        PathFinder::new(&g2).whats_next(&a).unwrap()
    );
    assert_eq!(
        PathFinder::new(&g1).shortest_path(&a, &c).unwrap(),
        PathFinder::new(&g2).shortest_path(&a, &c).unwrap()
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Ingestion
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_store_payload_end_to_end() {
    let snapshot: CatalogSnapshot = serde_json::from_value(json!({
        "version": 42,
        "strength_scale": "store",
        "editions": [
            {"id": "ff-vol-1", "title": "Fantastic Four Omnibus Vol. 1",
             "issues_collected": "Fantastic Four #1-30, Annual #1", "print_status": "in_print",
             "cover_price": "$125.00", "importance": "essential"},
            {"id": "ff-epic-1", "title": "Fantastic Four Epic Collection: The World's Greatest",
             "issues_collected": "Fantastic Four #1-18", "print_status": "out_of_print"},
            {"id": "ff-vol-2", "title": "Fantastic Four Omnibus Vol. 2",
             "issues_collected": "FF #31-60, Annual #2-4"},
            {"id": "ff-vol-2", "title": "Duplicate row"}
        ],
        "connections": [
            {"source_type": "edition", "source_id": "ff-vol-1", "target_type": "edition",
             "target_id": "ff-vol-2", "connection_type": "leads_to", "strength": 9},
            {"source_type": "edition", "source_id": "ff-vol-2", "target_type": "edition",
             "target_id": "ff-vol-2", "connection_type": "leads_to", "strength": 5},
            {"source_type": "event", "source_id": "galactus-trilogy", "target_type": "edition",
             "target_id": "ff-vol-1", "connection_type": "ties_into"}
        ]
    }))
    .unwrap();

    let catalog = BuiltCatalog::build(&snapshot);
    assert_eq!(catalog.graph.edition_count(), 3);
    assert_eq!(catalog.graph.connection_count(), 1);
    assert_eq!(catalog.skipped_connections, 1);

    let kinds: Vec<&str> = catalog.warnings.iter().map(|w| w.kind()).collect();
    assert!(kinds.contains(&"malformed_content"));
    assert!(kinds.contains(&"invalid_connection"));

    let vol1 = EditionId::new("ff-vol-1");
    assert_eq!(catalog.index.issues(&vol1).map(|s| s.len()), Some(31));
    assert_eq!(catalog.graph.edition(&vol1).and_then(|e| e.cover_price), Some(125.0));

    let next = PathFinder::new(&catalog.graph).whats_next(&vol1).unwrap();
    assert_eq!(next[0].edition, EditionId::new("ff-vol-2"));
    assert!((next[0].strength - 0.9).abs() < 1e-6);

    let overlap = OverlapEngine::new(&catalog.graph, &catalog.index)
        .pairwise(&EditionId::new("ff-epic-1"), &vol1)
        .unwrap();
    assert_eq!(overlap.shared_count, 18);
    assert_close(overlap.pct_of_a, 100.0);
}
