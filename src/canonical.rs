//! Canonical serialization for deterministic hashing.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: struct fields serialize in declaration order
//! - Stable collection order: only `Vec` and `BTreeMap`/`BTreeSet` go into
//!   hashed data, never `HashMap`
//! - Floats that feed a hash are quantized first

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

use crate::graph::EditionGraph;
use crate::index::IssueIndex;
use crate::types::{ConnectionType, EditionId, IssueId};

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    // Only called with derived Serialize impls over string keys, which
    // cannot fail.
    serde_json::to_vec(value).expect("canonical serialization of derived type")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

#[derive(Serialize)]
struct FingerprintEdition<'a> {
    id: &'a EditionId,
    issues: Vec<&'a IssueId>,
}

#[derive(Serialize)]
struct FingerprintConnection {
    source: EditionId,
    target: EditionId,
    connection_type: ConnectionType,
    strength: i64,
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    editions: Vec<FingerprintEdition<'a>>,
    connections: Vec<FingerprintConnection>,
}

/// Fingerprint of a built catalog.
///
/// Covers the indexed editions with their canonical issue sets and every
/// connection in the graph. Strengths are quantized to 1e-6. Two builds
/// of the same snapshot always agree.
pub fn catalog_fingerprint(graph: &EditionGraph, index: &IssueIndex) -> String {
    let editions = index
        .edition_ids()
        .map(|id| FingerprintEdition {
            id,
            issues: index.issues(id).map(|s| s.iter().collect()).unwrap_or_default(),
        })
        .collect();
    let connections = graph
        .connections()
        .map(|c| FingerprintConnection {
            strength: (f64::from(c.strength) * 1_000_000.0).round() as i64,
            source: c.source,
            target: c.target,
            connection_type: c.connection_type,
        })
        .collect();
    canonical_hash_hex(&FingerprintInput { editions, connections })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Connection, Edition};

    fn make_catalog(strength: f32) -> (EditionGraph, IssueIndex) {
        let editions = vec![
            Edition::new("a", "A", vec![IssueId::new("FF", "1", false)]),
            Edition::new("b", "B", vec![IssueId::new("FF", "2", false)]),
        ];
        let (index, _) = IssueIndex::build(&editions);
        let (graph, _) = EditionGraph::build(editions, vec![Connection::leads_to("a", "b", strength)]);
        (graph, index)
    }

    #[test]
    fn test_hash_determinism() {
        assert_eq!(canonical_hash(&("x", 1)), canonical_hash(&("x", 1)));
        assert_eq!(canonical_hash_hex(&"x").len(), 16);
    }

    #[test]
    fn test_fingerprint_stable_across_builds() {
        let (g1, i1) = make_catalog(0.5);
        let (g2, i2) = make_catalog(0.5);
        assert_eq!(catalog_fingerprint(&g1, &i1), catalog_fingerprint(&g2, &i2));
    }

    #[test]
    fn test_fingerprint_tracks_strength() {
        let (g1, i1) = make_catalog(0.5);
        let (g2, i2) = make_catalog(0.6);
        assert_ne!(catalog_fingerprint(&g1, &i1), catalog_fingerprint(&g2, &i2));
    }
}
