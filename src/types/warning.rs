//! Data-quality warnings.
//!
//! Problems in catalog data never fail a request. The offending edition or
//! connection is excluded and one of these warnings travels back with the
//! result so data owners can fix the source.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::connection::ConnectionType;
use super::edition::EditionId;

/// A recoverable data-quality problem.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// An edition was excluded because its content is unusable.
    #[error("malformed content in edition {edition}: {reason}")]
    MalformedContent {
        /// The excluded edition.
        edition: EditionId,
        /// What is wrong with it.
        reason: String,
    },

    /// A connection was dropped from the graph.
    #[error("invalid connection {from} -> {to}: {reason}")]
    InvalidConnection {
        /// Source edition as given by the catalog.
        #[serde(rename = "source")]
        from: EditionId,
        /// Target edition as given by the catalog.
        #[serde(rename = "target")]
        to: EditionId,
        /// Connection type, when it could be parsed.
        connection_type: Option<ConnectionType>,
        /// Why it was dropped.
        reason: String,
    },

    /// A cycle was found among ordering or prerequisite connections.
    #[error("cycle detected: {}", format_cycle(.cycle))]
    CycleDetected {
        /// Editions on the cycle, in reading direction, starting from the
        /// smallest identifier.
        cycle: Vec<EditionId>,
    },
}

impl DataWarning {
    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedContent { .. } => "malformed_content",
            Self::InvalidConnection { .. } => "invalid_connection",
            Self::CycleDetected { .. } => "cycle_detected",
        }
    }

    pub(crate) fn malformed(edition: &EditionId, reason: impl Into<String>) -> Self {
        Self::MalformedContent {
            edition: edition.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_connection(
        from: &EditionId,
        to: &EditionId,
        connection_type: Option<ConnectionType>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConnection {
            from: from.clone(),
            to: to.clone(),
            connection_type,
            reason: reason.into(),
        }
    }
}

fn format_cycle(cycle: &[EditionId]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(|id| id.as_str()).collect();
    if let Some(first) = cycle.first() {
        parts.push(first.as_str());
    }
    parts.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_closes_loop() {
        let warning = DataWarning::CycleDetected {
            cycle: vec![EditionId::new("a"), EditionId::new("b")],
        };
        assert_eq!(warning.to_string(), "cycle detected: a -> b -> a");
        assert_eq!(warning.kind(), "cycle_detected");
    }

    #[test]
    fn test_invalid_connection_wire_names() {
        let warning = DataWarning::invalid_connection(
            &EditionId::new("a"),
            &EditionId::new("a"),
            Some(ConnectionType::LeadsTo),
            "self-loop",
        );
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "invalid_connection");
        assert_eq!(json["source"], "a");
        assert_eq!(json["target"], "a");
        assert_eq!(json["connection_type"], "leads-to");
    }
}
