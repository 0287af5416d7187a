//! Edition Graph Store.
//!
//! Directed multigraph over editions, built once per snapshot and read-only
//! afterwards. Invalid connections never enter the graph: self-loops,
//! unknown endpoints and out-of-range strengths are dropped and reported.
//!
//! Adjacency lists are held sorted by (neighbor id, connection type), so
//! every traversal sees neighbors in the same order on every build.

use std::collections::BTreeMap;

use crate::types::{Connection, ConnectionFilter, ConnectionType, DataWarning, Edition, EditionId};

/// One end of a connection, as seen from the other end.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjacency {
    /// The neighboring edition.
    pub edition: EditionId,
    /// Connection type.
    pub connection_type: ConnectionType,
    /// Strength in `[0, 1]`.
    pub strength: f32,
}

/// Read-only edition graph.
#[derive(Debug, Clone, Default)]
pub struct EditionGraph {
    editions: BTreeMap<EditionId, Edition>,
    outgoing: BTreeMap<EditionId, Vec<Adjacency>>,
    incoming: BTreeMap<EditionId, Vec<Adjacency>>,
    connection_count: usize,
}

impl EditionGraph {
    /// Build the graph.
    ///
    /// Connections repeating the same (source, target, type) are merged,
    /// keeping the strongest.
    pub fn build(editions: Vec<Edition>, connections: Vec<Connection>) -> (Self, Vec<DataWarning>) {
        let mut graph = Self::default();
        let mut warnings = Vec::new();

        for edition in editions {
            graph.editions.entry(edition.id.clone()).or_insert(edition);
        }

        let mut merged: BTreeMap<(EditionId, EditionId, ConnectionType), f32> = BTreeMap::new();
        for conn in connections {
            if let Some(reason) = graph.rejection_reason(&conn) {
                warnings.push(DataWarning::invalid_connection(
                    &conn.source,
                    &conn.target,
                    Some(conn.connection_type),
                    reason,
                ));
                continue;
            }

            let key = (conn.source.clone(), conn.target.clone(), conn.connection_type);
            match merged.get_mut(&key) {
                Some(existing) => {
                    warnings.push(DataWarning::invalid_connection(
                        &conn.source,
                        &conn.target,
                        Some(conn.connection_type),
                        "duplicate connection; strongest kept",
                    ));
                    *existing = existing.max(conn.strength);
                }
                None => {
                    merged.insert(key, conn.strength);
                }
            }
        }

        for ((source, target, connection_type), strength) in merged {
            graph.incoming.entry(target.clone()).or_default().push(Adjacency {
                edition: source.clone(),
                connection_type,
                strength,
            });
            graph.outgoing.entry(source).or_default().push(Adjacency {
                edition: target,
                connection_type,
                strength,
            });
            graph.connection_count += 1;
        }

        // Outgoing lists are already in (target, type) order from the map;
        // incoming lists need sorting by (source, type).
        for list in graph.incoming.values_mut() {
            list.sort_by(|a, b| {
                a.edition
                    .cmp(&b.edition)
                    .then_with(|| a.connection_type.cmp(&b.connection_type))
            });
        }

        (graph, warnings)
    }

    fn rejection_reason(&self, conn: &Connection) -> Option<&'static str> {
        if conn.is_self_loop() {
            Some("self-loop")
        } else if !self.editions.contains_key(&conn.source) {
            Some("unknown source edition")
        } else if !self.editions.contains_key(&conn.target) {
            Some("unknown target edition")
        } else if !conn.strength.is_finite() || !(0.0..=1.0).contains(&conn.strength) {
            Some("strength outside [0, 1]")
        } else {
            None
        }
    }

    /// Outgoing connections admitted by the filter.
    pub fn successors(&self, id: &EditionId, filter: ConnectionFilter) -> Vec<&Adjacency> {
        Self::filtered(self.outgoing.get(id), filter)
    }

    /// Incoming connections admitted by the filter.
    pub fn predecessors(&self, id: &EditionId, filter: ConnectionFilter) -> Vec<&Adjacency> {
        Self::filtered(self.incoming.get(id), filter)
    }

    fn filtered(list: Option<&Vec<Adjacency>>, filter: ConnectionFilter) -> Vec<&Adjacency> {
        list.map(|l| l.iter().filter(|a| filter.contains(a.connection_type)).collect())
            .unwrap_or_default()
    }

    /// Whether an edition is in the graph.
    pub fn contains(&self, id: &EditionId) -> bool {
        self.editions.contains_key(id)
    }

    /// Look up an edition.
    pub fn edition(&self, id: &EditionId) -> Option<&Edition> {
        self.editions.get(id)
    }

    /// All editions in id order.
    pub fn editions(&self) -> impl Iterator<Item = &Edition> {
        self.editions.values()
    }

    /// Number of editions.
    pub fn edition_count(&self) -> usize {
        self.editions.len()
    }

    /// Number of connections.
    pub fn connection_count(&self) -> usize {
        self.connection_count
    }

    /// All connections in canonical (source, target, type) order.
    pub fn connections(&self) -> impl Iterator<Item = Connection> + '_ {
        self.outgoing.iter().flat_map(|(source, list)| {
            list.iter()
                .map(move |a| Connection::new(source.clone(), a.edition.clone(), a.connection_type, a.strength))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IssueId;

    fn make_edition(id: &str) -> Edition {
        Edition::new(id, id.to_uppercase(), vec![IssueId::new("Series", "1", false)])
    }

    fn make_graph(connections: Vec<Connection>) -> (EditionGraph, Vec<DataWarning>) {
        EditionGraph::build(
            vec![make_edition("a"), make_edition("b"), make_edition("c")],
            connections,
        )
    }

    #[test]
    fn test_successors_and_predecessors() {
        let (graph, warnings) = make_graph(vec![
            Connection::leads_to("a", "b", 0.9),
            Connection::new("a", "c", ConnectionType::Optional, 0.2),
            Connection::new("c", "b", ConnectionType::Prerequisite, 0.7),
        ]);
        assert!(warnings.is_empty());
        assert_eq!(graph.connection_count(), 3);

        let all: Vec<&str> = graph
            .successors(&EditionId::new("a"), ConnectionFilter::ALL)
            .iter()
            .map(|a| a.edition.as_str())
            .collect();
        assert_eq!(all, vec!["b", "c"]);

        let routable = graph.successors(&EditionId::new("a"), ConnectionFilter::ROUTABLE);
        assert_eq!(routable.len(), 1);

        let into_b: Vec<&str> = graph
            .predecessors(&EditionId::new("b"), ConnectionFilter::ALL)
            .iter()
            .map(|a| a.edition.as_str())
            .collect();
        assert_eq!(into_b, vec!["a", "c"]);
        assert!(graph.successors(&EditionId::new("zzz"), ConnectionFilter::ALL).is_empty());
    }

    #[test]
    fn test_invalid_connections_dropped_with_warnings() {
        let (graph, warnings) = make_graph(vec![
            Connection::leads_to("a", "a", 0.5),
            Connection::leads_to("a", "missing", 0.5),
            Connection::leads_to("ghost", "b", 0.5),
            Connection::leads_to("a", "b", 1.5),
        ]);
        assert_eq!(graph.connection_count(), 0);
        assert_eq!(warnings.len(), 4);
        assert!(warnings.iter().all(|w| w.kind() == "invalid_connection"));
    }

    #[test]
    fn test_parallel_types_kept_duplicates_merged() {
        let (graph, warnings) = make_graph(vec![
            Connection::leads_to("a", "b", 0.3),
            Connection::leads_to("a", "b", 0.8),
            Connection::new("a", "b", ConnectionType::Crossover, 0.4),
        ]);
        assert_eq!(warnings.len(), 1);
        let succ = graph.successors(&EditionId::new("a"), ConnectionFilter::ALL);
        assert_eq!(succ.len(), 2);
        assert_eq!(succ[0].connection_type, ConnectionType::LeadsTo);
        assert!((succ[0].strength - 0.8).abs() < f32::EPSILON);
        assert_eq!(succ[1].connection_type, ConnectionType::Crossover);
    }

    #[test]
    fn test_connections_canonical_order() {
        let (graph, _) = make_graph(vec![
            Connection::leads_to("c", "a", 0.5),
            Connection::leads_to("a", "c", 0.5),
            Connection::leads_to("a", "b", 0.5),
        ]);
        let order: Vec<(String, String)> = graph
            .connections()
            .map(|c| (c.source.to_string(), c.target.to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a".to_string(), "b".to_string()),
                ("a".to_string(), "c".to_string()),
                ("c".to_string(), "a".to_string()),
            ]
        );
    }
}
