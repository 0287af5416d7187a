//! JSON file snapshot source.
//!
//! Reads a catalog exported as one JSON document (the [`CatalogSnapshot`]
//! shape). The file's modification time, in milliseconds since the epoch,
//! is the snapshot version: rewriting the file bumps the version. A
//! `version` field inside the document is overridden.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use super::SnapshotSource;
use crate::ingest::CatalogSnapshot;
use crate::types::SnapshotVersion;

/// Error type for the JSON file source.
#[derive(Debug, thiserror::Error)]
pub enum FileSourceError {
    /// File could not be read.
    #[error("Snapshot file error: {0}")]
    Io(#[from] std::io::Error),
    /// File is not a valid catalog document.
    #[error("Snapshot file is not a valid catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Snapshot source backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    /// Create a source reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the catalog file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSource for JsonFileSource {
    type Error = FileSourceError;

    async fn current_version(&self) -> Result<SnapshotVersion, Self::Error> {
        let modified = tokio::fs::metadata(&self.path).await?.modified()?;
        let millis = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Ok(SnapshotVersion(millis))
    }

    fn kind(&self) -> &'static str {
        "file"
    }

    async fn fetch_snapshot(&self) -> Result<CatalogSnapshot, Self::Error> {
        let version = self.current_version().await?;
        let bytes = tokio::fs::read(&self.path).await?;
        let mut snapshot: CatalogSnapshot = serde_json::from_slice(&bytes)?;
        snapshot.version = version;
        tracing::debug!(
            path = %self.path.display(),
            snapshot_version = version.0,
            bytes = bytes.len(),
            "read catalog file"
        );
        Ok(snapshot)
    }
}
