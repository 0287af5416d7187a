//! Connection types for the edition graph.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::edition::EditionId;

/// Type of a directed connection between two editions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionType {
    /// Narrative succession: read the source, then the target.
    LeadsTo,
    /// Crossover tie-in across titles.
    Crossover,
    /// The source is foundational material for the target.
    Prerequisite,
    /// Loose relationship; never used for routing.
    Optional,
}

impl ConnectionType {
    /// Parse a connection type.
    ///
    /// Accepts the four canonical names and the catalog's finer-grained
    /// relationship kinds, which fold onto them.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "leads_to" | "recommended_after" | "spin_off" => Some(Self::LeadsTo),
            "crossover" | "ties_into" => Some(Self::Crossover),
            "prerequisite" => Some(Self::Prerequisite),
            "optional" | "references" | "parallel" | "retcons" | "collected_in" => {
                Some(Self::Optional)
            }
            _ => None,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::LeadsTo => 1,
            Self::Crossover => 1 << 1,
            Self::Prerequisite => 1 << 2,
            Self::Optional => 1 << 3,
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeadsTo => write!(f, "leads-to"),
            Self::Crossover => write!(f, "crossover"),
            Self::Prerequisite => write!(f, "prerequisite"),
            Self::Optional => write!(f, "optional"),
        }
    }
}

/// Set of connection types used to filter adjacency queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionFilter(u8);

impl ConnectionFilter {
    /// Every connection type.
    pub const ALL: Self = Self(0b1111);
    /// No connection type.
    pub const NONE: Self = Self(0);
    /// Edges that suggest what to read next.
    pub const NEXT_READS: Self = Self::NONE.with(ConnectionType::LeadsTo).with(ConnectionType::Crossover);
    /// Edges usable for shortest-path routing.
    pub const ROUTABLE: Self = Self::ALL.without(ConnectionType::Optional);
    /// Prerequisite edges only.
    pub const PREREQUISITES: Self = Self::NONE.with(ConnectionType::Prerequisite);
    /// Edges that impose a reading order.
    pub const ORDERING: Self = Self::NONE.with(ConnectionType::LeadsTo).with(ConnectionType::Prerequisite);

    /// Filter matching exactly the given types.
    pub fn only(types: &[ConnectionType]) -> Self {
        types.iter().fold(Self::NONE, |f, t| f.with(*t))
    }

    /// Add a type to the filter.
    pub const fn with(self, ty: ConnectionType) -> Self {
        Self(self.0 | ty.bit())
    }

    /// Remove a type from the filter.
    pub const fn without(self, ty: ConnectionType) -> Self {
        Self(self.0 & !ty.bit())
    }

    /// Whether the filter admits a type.
    pub const fn contains(&self, ty: ConnectionType) -> bool {
        self.0 & ty.bit() != 0
    }
}

impl Default for ConnectionFilter {
    fn default() -> Self {
        Self::ALL
    }
}

/// Directed, typed connection between two editions.
///
/// Strength lies in `[0, 1]`. Source and target always differ in a built
/// graph; self-loops are rejected at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Source edition.
    pub source: EditionId,
    /// Target edition.
    pub target: EditionId,
    /// Connection type.
    pub connection_type: ConnectionType,
    /// Strength in `[0, 1]`.
    pub strength: f32,
}

impl Connection {
    /// Create a new connection.
    pub fn new(
        source: impl Into<EditionId>,
        target: impl Into<EditionId>,
        connection_type: ConnectionType,
        strength: f32,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            connection_type,
            strength,
        }
    }

    /// Create a leads-to connection.
    pub fn leads_to(source: impl Into<EditionId>, target: impl Into<EditionId>, strength: f32) -> Self {
        Self::new(source, target, ConnectionType::LeadsTo, strength)
    }

    /// Whether source and target are the same edition.
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Canonical ordering key: (source, target, type).
    pub fn sort_key(&self) -> (&EditionId, &EditionId, ConnectionType) {
        (&self.source, &self.target, self.connection_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_kinds_fold_onto_core_types() {
        assert_eq!(ConnectionType::from_str("leads_to"), Some(ConnectionType::LeadsTo));
        assert_eq!(ConnectionType::from_str("recommended_after"), Some(ConnectionType::LeadsTo));
        assert_eq!(ConnectionType::from_str("ties_into"), Some(ConnectionType::Crossover));
        assert_eq!(ConnectionType::from_str("leads-to"), Some(ConnectionType::LeadsTo));
        assert_eq!(ConnectionType::from_str("collected_in"), Some(ConnectionType::Optional));
        assert_eq!(ConnectionType::from_str("sequel_of"), None);
    }

    #[test]
    fn test_filter_membership() {
        assert!(ConnectionFilter::ROUTABLE.contains(ConnectionType::Prerequisite));
        assert!(!ConnectionFilter::ROUTABLE.contains(ConnectionType::Optional));
        assert!(ConnectionFilter::NEXT_READS.contains(ConnectionType::Crossover));
        assert!(!ConnectionFilter::NEXT_READS.contains(ConnectionType::Prerequisite));
        assert_eq!(
            ConnectionFilter::only(&[ConnectionType::Prerequisite]),
            ConnectionFilter::PREREQUISITES
        );
    }

    #[test]
    fn test_self_loop_detection() {
        assert!(Connection::leads_to("a", "a", 0.5).is_self_loop());
        assert!(!Connection::leads_to("a", "b", 0.5).is_self_loop());
    }
}
