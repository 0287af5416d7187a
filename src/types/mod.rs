//! Core types for the edition graph.

pub mod connection;
pub mod edition;
pub mod issue;
pub mod warning;

pub use connection::{Connection, ConnectionFilter, ConnectionType};
pub use edition::{normalize_title, Edition, EditionFormat, EditionId, Importance, PrintStatus};
pub use issue::IssueId;
pub use warning::DataWarning;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonically increasing catalog version reported by the data store.
///
/// Used as the snapshot cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotVersion(pub u64);

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
