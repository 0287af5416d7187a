//! Engine integration tests: snapshot lifecycle through the async engine.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use edition_graph::{
    CacheConfig, CatalogEngine, CatalogSnapshot, EditionId, EngineConfig, EngineError, InMemorySnapshotSource,
    JsonFileSource, SnapshotVersion,
};
use serde_json::json;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn catalog_json(version: u64) -> serde_json::Value {
    json!({
        "version": version,
        "editions": [
            {"id": "a", "title": "FF Vol. 1", "issues_collected": "FF #1-2", "print_status": "in_print",
             "cover_price": 20.0},
            {"id": "b", "title": "FF Vol. 2", "issues_collected": "FF #1-3", "print_status": "in_print",
             "cover_price": 35.0},
            {"id": "c", "title": "FF Vol. 3", "issues_collected": "FF #4", "print_status": "out_of_print"}
        ],
        "connections": [
            {"source_id": "a", "target_id": "b", "connection_type": "leads_to", "strength": 0.9},
            {"source_id": "b", "target_id": "c", "connection_type": "leads_to", "strength": 0.5}
        ]
    })
}

fn make_snapshot(version: u64) -> CatalogSnapshot {
    serde_json::from_value(catalog_json(version)).unwrap()
}

fn make_engine(config: EngineConfig) -> Arc<CatalogEngine<InMemorySnapshotSource>> {
    let source = Arc::new(InMemorySnapshotSource::new(make_snapshot(1)));
    Arc::new(CatalogEngine::new(source, config))
}

fn id(s: &str) -> EditionId {
    EditionId::new(s)
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_queries_share_one_fetch() {
    let engine = make_engine(EngineConfig::default());
    engine.source().set_fetch_delay(Some(Duration::from_millis(50)));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move { engine.successors(&id("a")).await });
    }
    while let Some(joined) = tasks.join_next().await {
        let result = joined.unwrap().unwrap();
        assert_eq!(result.snapshot_version, SnapshotVersion(1));
    }

    assert_eq!(engine.source().fetch_count(), 1);
    assert_eq!(engine.cache_stats().builds, 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_times_out_then_recovers() {
    let config = EngineConfig {
        fetch_timeout: Duration::from_secs(1),
        ..EngineConfig::default()
    };
    let engine = make_engine(config);
    engine.source().set_fetch_delay(Some(Duration::from_secs(5)));

    let err = engine.successors(&id("a")).await.unwrap_err();
    assert!(matches!(err, EngineError::SnapshotUnavailable { .. }));
    assert!(engine.cached_catalog().is_none());

    engine.source().set_fetch_delay(None);
    let result = engine.successors(&id("a")).await.unwrap();
    assert_eq!(result.value[0].edition, id("b"));
    assert_eq!(engine.source().fetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_is_rebuilt() {
    let config = EngineConfig {
        cache: CacheConfig {
            ttl: Duration::from_secs(60),
            ..CacheConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = make_engine(config);

    engine.overlap(&id("a"), &id("b")).await.unwrap();
    engine.overlap(&id("a"), &id("b")).await.unwrap();
    assert_eq!(engine.source().fetch_count(), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    engine.overlap(&id("a"), &id("b")).await.unwrap();
    assert_eq!(engine.source().fetch_count(), 2);
}

#[tokio::test]
async fn test_answers_follow_published_version() {
    let engine = make_engine(EngineConfig::default());
    let before = engine.purchase_plan(&[id("a"), id("b"), id("c")], &[id("a")]).await.unwrap();
    assert_eq!(before.value.partially_owned.len(), 1);

    // Version 2 drops FF#3 from b, so owning a now covers it fully.
    let mut next = catalog_json(2);
    next["editions"][1]["issues_collected"] = json!("FF #1-2");
    engine.source().publish(serde_json::from_value(next).unwrap());

    let after = engine.purchase_plan(&[id("a"), id("b"), id("c")], &[id("a")]).await.unwrap();
    assert_eq!(after.snapshot_version, SnapshotVersion(2));
    assert!(after.value.partially_owned.is_empty());
    assert_eq!(after.value.owned.len(), 2);
}

#[tokio::test]
async fn test_disabled_cache_fetches_every_time() {
    let config = EngineConfig {
        cache: CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = make_engine(config);
    engine.successors(&id("a")).await.unwrap();
    engine.successors(&id("a")).await.unwrap();
    assert_eq!(engine.source().fetch_count(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// File Source
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_file_source_end_to_end() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", catalog_json(0)).unwrap();
    file.flush().unwrap();

    let engine = CatalogEngine::new(
        Arc::new(JsonFileSource::new(file.path())),
        EngineConfig::default(),
    );

    let first = engine.aggregate(&id("b"), &[id("a")]).await.unwrap();
    assert!((first.value.pct_covered - 66.67).abs() < 0.01);

    let path = engine.shortest_path(&id("a"), &id("c"), None).await.unwrap();
    assert!(path.value.is_found());
    assert_eq!(path.snapshot_version, first.snapshot_version);

    // Rewrite with a later mtime; the engine must pick up the new catalog.
    let mut updated = catalog_json(0);
    updated["connections"] = json!([]);
    std::fs::write(file.path(), updated.to_string()).unwrap();
    let later = SystemTime::now() + Duration::from_secs(10);
    std::fs::File::options()
        .write(true)
        .open(file.path())
        .unwrap()
        .set_modified(later)
        .unwrap();

    let next = engine.successors(&id("a")).await.unwrap();
    assert!(next.value.is_empty());
    assert!(next.snapshot_version > first.snapshot_version);
}

#[tokio::test]
async fn test_missing_file_is_unavailable() {
    let engine = CatalogEngine::new(
        Arc::new(JsonFileSource::new("/nonexistent/catalog.json")),
        EngineConfig::default(),
    );
    let err = engine.duplicates().await.unwrap_err();
    match err {
        EngineError::SnapshotUnavailable { retry_after, .. } => assert_eq!(retry_after, Duration::from_secs(5)),
        other => panic!("unexpected error: {other:?}"),
    }
}
