//! Service state management.
//!
//! Contains the shared engine and the runtime-selected snapshot source.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::engine::{CatalogEngine, EngineConfig};
use crate::ingest::CatalogSnapshot;
use crate::source::file::FileSourceError;
use crate::source::memory::InMemoryError;
use crate::source::{InMemorySnapshotSource, JsonFileSource, SnapshotSource};
use crate::types::SnapshotVersion;

#[cfg(feature = "postgres")]
use crate::source::postgres::{PoolStats, PostgresError, PostgresSnapshotSource};

/// Snapshot source chosen at startup.
pub enum CatalogSource {
    /// Catalog exported to a JSON file.
    File(JsonFileSource),
    /// Catalog held in memory.
    Memory(InMemorySnapshotSource),
    /// Catalog tables in PostgreSQL.
    #[cfg(feature = "postgres")]
    Postgres(PostgresSnapshotSource),
}

/// Error type for [`CatalogSource`].
#[derive(Debug, thiserror::Error)]
pub enum CatalogSourceError {
    /// JSON file source failed.
    #[error(transparent)]
    File(#[from] FileSourceError),
    /// In-memory source failed.
    #[error(transparent)]
    Memory(#[from] InMemoryError),
    /// Database source failed.
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] PostgresError),
}

impl CatalogSource {
    /// Database pool statistics, for the PostgreSQL backend.
    #[cfg(feature = "postgres")]
    pub fn pool_stats(&self) -> Option<PoolStats> {
        match self {
            Self::Postgres(source) => Some(source.pool_stats()),
            _ => None,
        }
    }
}

#[async_trait]
impl SnapshotSource for CatalogSource {
    type Error = CatalogSourceError;

    async fn current_version(&self) -> Result<SnapshotVersion, Self::Error> {
        Ok(match self {
            Self::File(source) => source.current_version().await?,
            Self::Memory(source) => source.current_version().await?,
            #[cfg(feature = "postgres")]
            Self::Postgres(source) => source.current_version().await?,
        })
    }

    async fn fetch_snapshot(&self) -> Result<CatalogSnapshot, Self::Error> {
        Ok(match self {
            Self::File(source) => source.fetch_snapshot().await?,
            Self::Memory(source) => source.fetch_snapshot().await?,
            #[cfg(feature = "postgres")]
            Self::Postgres(source) => source.fetch_snapshot().await?,
        })
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::File(source) => source.kind(),
            Self::Memory(source) => source.kind(),
            #[cfg(feature = "postgres")]
            Self::Postgres(source) => source.kind(),
        }
    }
}

/// Shared service state.
pub struct ServiceState<S: SnapshotSource + 'static> {
    /// The catalog engine.
    pub engine: Arc<CatalogEngine<S>>,
    started_at: Instant,
}

impl<S: SnapshotSource + 'static> ServiceState<S> {
    /// Create service state over a source.
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self {
            engine: Arc::new(CatalogEngine::new(Arc::new(source), config)),
            started_at: Instant::now(),
        }
    }

    /// Create service state with configuration read from the environment.
    pub fn from_env(source: S) -> Self {
        Self::new(source, EngineConfig::from_env())
    }

    /// Seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl<S: SnapshotSource + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            started_at: self.started_at,
        }
    }
}
