//! In-memory snapshot source for testing and embedding.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::SnapshotSource;
use crate::ingest::CatalogSnapshot;
use crate::types::SnapshotVersion;

/// Error type for in-memory source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// Source switched offline.
    #[error("Snapshot source offline")]
    Offline,
}

/// In-memory snapshot source.
///
/// Holds one published snapshot. Fetches can be delayed or failed to
/// exercise timeout and outage handling.
#[derive(Debug)]
pub struct InMemorySnapshotSource {
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    fetch_delay: RwLock<Option<Duration>>,
    offline: AtomicBool,
    fetches: AtomicUsize,
}

impl InMemorySnapshotSource {
    /// Create a source holding `snapshot`.
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            fetch_delay: RwLock::new(None),
            offline: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Replace the held snapshot.
    pub fn publish(&self, snapshot: CatalogSnapshot) {
        *self.snapshot.write() = Arc::new(snapshot);
    }

    /// Delay every fetch by `delay`.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        *self.fetch_delay.write() = delay;
    }

    /// Fail every call while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of completed or started fetches.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), InMemoryError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(InMemoryError::Offline)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SnapshotSource for InMemorySnapshotSource {
    type Error = InMemoryError;

    async fn current_version(&self) -> Result<SnapshotVersion, Self::Error> {
        self.check_online()?;
        Ok(self.snapshot.read().version)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn fetch_snapshot(&self) -> Result<CatalogSnapshot, Self::Error> {
        self.check_online()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let snapshot = Arc::clone(&self.snapshot.read());
        Ok(CatalogSnapshot::clone(&snapshot))
    }
}
