//! Built catalog: one snapshot validated, indexed and graphed.

use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{info, warn};

use crate::canonical::catalog_fingerprint;
use crate::graph::EditionGraph;
use crate::index::IssueIndex;
use crate::ingest::CatalogSnapshot;
use crate::types::{DataWarning, SnapshotVersion};

/// Immutable product of one snapshot.
///
/// Shared read-only between concurrent queries once built.
#[derive(Debug, Clone)]
pub struct BuiltCatalog {
    /// Snapshot version this catalog was built from.
    pub version: SnapshotVersion,
    /// When the snapshot was fetched.
    pub fetched_at: DateTime<Utc>,
    /// Fingerprint over editions, issue sets and connections.
    pub fingerprint: String,
    /// Edition graph.
    pub graph: EditionGraph,
    /// Issue index.
    pub index: IssueIndex,
    /// Data-quality warnings from ingestion and construction.
    pub warnings: Vec<DataWarning>,
    /// Connections ignored because an endpoint is not an edition.
    pub skipped_connections: usize,
}

impl BuiltCatalog {
    /// Build from a fetched snapshot.
    ///
    /// Editions excluded by the index (no issues) are also kept out of the
    /// graph, so connections touching them are reported as invalid.
    pub fn build(snapshot: &CatalogSnapshot) -> Self {
        let start = Instant::now();
        let validated = snapshot.validate();
        let mut warnings = validated.warnings;

        let (index, index_warnings) = IssueIndex::build(&validated.editions);
        warnings.extend(index_warnings);

        let editions = validated
            .editions
            .into_iter()
            .filter(|e| index.contains(&e.id))
            .collect();
        let (graph, graph_warnings) = EditionGraph::build(editions, validated.connections);
        warnings.extend(graph_warnings);

        for warning in &warnings {
            warn!(
                snapshot_version = snapshot.version.0,
                kind = warning.kind(),
                detail = %warning,
                "catalog data warning"
            );
        }

        let fingerprint = catalog_fingerprint(&graph, &index);
        info!(
            snapshot_version = snapshot.version.0,
            edition_count = graph.edition_count(),
            connection_count = graph.connection_count(),
            issue_count = index.issue_count(),
            warning_count = warnings.len(),
            skipped_connections = validated.skipped_non_edition,
            fingerprint = %fingerprint,
            latency_ms = start.elapsed().as_millis() as u64,
            "catalog built"
        );

        Self {
            version: snapshot.version,
            fetched_at: snapshot.fetched_at,
            fingerprint,
            graph,
            index,
            warnings,
            skipped_connections: validated.skipped_non_edition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_edition_excluded_and_its_connections_reported() {
        let snapshot: CatalogSnapshot = serde_json::from_value(json!({
            "version": 7,
            "strength_scale": "store",
            "editions": [
                {"id": "a", "title": "A", "issues_collected": "FF #1-2"},
                {"id": "hollow", "title": "Hollow"}
            ],
            "connections": [
                {"source_id": "a", "target_id": "hollow", "connection_type": "leads_to", "strength": 8}
            ]
        }))
        .unwrap();

        let catalog = BuiltCatalog::build(&snapshot);
        assert_eq!(catalog.version, SnapshotVersion(7));
        assert_eq!(catalog.graph.edition_count(), 1);
        assert_eq!(catalog.graph.connection_count(), 0);

        let kinds: Vec<&str> = catalog.warnings.iter().map(|w| w.kind()).collect();
        assert_eq!(kinds, vec!["malformed_content", "invalid_connection"]);
    }

    #[test]
    fn test_rebuild_same_fingerprint() {
        let snapshot: CatalogSnapshot = serde_json::from_value(json!({
            "version": 1,
            "editions": [
                {"id": "a", "issues_collected": "FF #1-2"},
                {"id": "b", "issues_collected": "FF #2-3"}
            ],
            "connections": [{"source_id": "a", "target_id": "b", "strength": 0.7}]
        }))
        .unwrap();
        assert_eq!(
            BuiltCatalog::build(&snapshot).fingerprint,
            BuiltCatalog::build(&snapshot).fingerprint
        );
    }
}
