//! Snapshot sources.
//!
//! A source is the data-store collaborator: it reports the current catalog
//! version and hands over the whole catalog as one [`CatalogSnapshot`].
//! Nothing downstream reads from a source after the snapshot is built.

pub mod file;
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::ingest::CatalogSnapshot;
use crate::types::SnapshotVersion;

/// Trait for catalog snapshot backends.
///
/// `current_version` must be cheap; it runs on every request. Versions
/// increase monotonically as the catalog changes.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Error type for source operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Version of the catalog as it stands now.
    async fn current_version(&self) -> Result<SnapshotVersion, Self::Error>;

    /// Fetch the full catalog.
    async fn fetch_snapshot(&self) -> Result<CatalogSnapshot, Self::Error>;

    /// Short backend name for health output.
    fn kind(&self) -> &'static str {
        "custom"
    }
}

pub use file::JsonFileSource;
pub use memory::InMemorySnapshotSource;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresSnapshotSource};
