//! Read-through snapshot cache.
//!
//! Holds built catalogs keyed by [`SnapshotVersion`], bounded by an LRU and
//! a time-to-live.
//!
//! ## Single-flight population
//!
//! Each key owns a slot with a [`tokio::sync::OnceCell`]. The first caller
//! for an empty slot runs the build; concurrent callers for the same key
//! await that same build instead of starting their own. A failed build
//! leaves the slot empty, so the next caller retries.
//!
//! ## Expiry
//!
//! A slot older than the TTL is replaced on access. Callers still awaiting
//! the old slot finish against it; new callers populate the replacement.
//! Expiry uses tokio's clock, which tests can pause and advance.

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use crate::types::SnapshotVersion;

/// Configuration for the snapshot cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live of a cached catalog.
    pub ttl: Duration,
    /// Maximum number of versions held.
    pub max_entries: usize,
    /// Whether to cache at all. When disabled every request rebuilds.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 16,
            enabled: true,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Current number of entries in the cache.
    pub len: usize,
    /// Maximum capacity of the cache.
    pub cap: usize,
    /// Lookups answered from a populated slot.
    pub hits: u64,
    /// Lookups that found no populated slot.
    pub misses: u64,
    /// Builds actually run.
    pub builds: u64,
}

struct Slot<T> {
    cell: OnceCell<Arc<T>>,
    created_at: Instant,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            created_at: Instant::now(),
        }
    }
}

/// Version-keyed cache with single-flight population.
pub struct SnapshotCache<T> {
    config: CacheConfig,
    slots: Option<Mutex<LruCache<SnapshotVersion, Arc<Slot<T>>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
}

impl<T> SnapshotCache<T> {
    /// Create a cache.
    pub fn new(config: CacheConfig) -> Self {
        let slots = if config.enabled {
            let size = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
            Some(Mutex::new(LruCache::new(size)))
        } else {
            None
        };
        Self {
            config,
            slots,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            builds: AtomicU64::new(0),
        }
    }

    /// Cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn slot(&self, slots: &Mutex<LruCache<SnapshotVersion, Arc<Slot<T>>>>, version: SnapshotVersion) -> Arc<Slot<T>> {
        let mut slots = slots.lock();
        if let Some(slot) = slots.get(&version) {
            if slot.created_at.elapsed() < self.config.ttl {
                return Arc::clone(slot);
            }
            tracing::debug!(snapshot_version = version.0, "snapshot cache entry expired");
        }
        let slot = Arc::new(Slot::new());
        slots.put(version, Arc::clone(&slot));
        slot
    }

    /// Return the cached value for `version`, building it on a miss.
    ///
    /// Concurrent calls for the same version share one build. Build errors
    /// are returned to every caller that awaited that build and are not
    /// cached.
    pub async fn get_or_try_build<F, Fut, E>(&self, version: SnapshotVersion, build: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(slots) = &self.slots else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            self.builds.fetch_add(1, Ordering::Relaxed);
            return build().await.map(Arc::new);
        };

        let slot = self.slot(slots, version);
        if let Some(value) = slot.cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(value));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let value = slot
            .cell
            .get_or_try_init(|| async move {
                self.builds.fetch_add(1, Ordering::Relaxed);
                build().await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(value))
    }

    /// Populated, unexpired value for `version`, without building.
    pub fn peek(&self, version: SnapshotVersion) -> Option<Arc<T>> {
        let slots = self.slots.as_ref()?.lock();
        let slot = slots.peek(&version)?;
        if slot.created_at.elapsed() >= self.config.ttl {
            return None;
        }
        slot.cell.get().cloned()
    }

    /// Drop every entry older than `version`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_before(&self, version: SnapshotVersion) -> usize {
        let Some(slots) = &self.slots else {
            return 0;
        };
        let mut slots = slots.lock();
        let stale: Vec<SnapshotVersion> = slots.iter().map(|(v, _)| *v).filter(|v| *v < version).collect();
        for v in &stale {
            slots.pop(v);
        }
        stale.len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Some(slots) = &self.slots {
            slots.lock().clear();
        }
    }

    /// Cache statistics.
    pub fn stats(&self) -> CacheStats {
        let (len, cap) = match &self.slots {
            Some(slots) => {
                let slots = slots.lock();
                (slots.len(), slots.cap().get())
            }
            None => (0, 0),
        };
        CacheStats {
            len,
            cap,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn make_cache(ttl_secs: u64, max_entries: usize) -> SnapshotCache<String> {
        SnapshotCache::new(CacheConfig {
            ttl: Duration::from_secs(ttl_secs),
            max_entries,
            enabled: true,
        })
    }

    async fn build_ok(label: &str) -> Result<String, String> {
        Ok(label.to_string())
    }

    #[tokio::test]
    async fn test_hit_after_miss() {
        let cache = make_cache(60, 4);
        let v = SnapshotVersion(1);
        let first = cache.get_or_try_build(v, || build_ok("one")).await.unwrap();
        let second = cache.get_or_try_build(v, || build_ok("other")).await.unwrap();
        assert_eq!(*first, "one");
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.builds), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_single_flight() {
        let cache = Arc::new(make_cache(60, 4));
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_build(SnapshotVersion(3), || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, String>("built".to_string())
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(*handle.await.unwrap().unwrap(), "built");
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_build_not_cached() {
        let cache = make_cache(60, 4);
        let v = SnapshotVersion(1);
        let err = cache
            .get_or_try_build(v, || async { Err::<String, _>("down".to_string()) })
            .await;
        assert_eq!(err, Err("down".to_string()));
        let ok = cache.get_or_try_build(v, || build_ok("up")).await.unwrap();
        assert_eq!(*ok, "up");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = make_cache(300, 4);
        let v = SnapshotVersion(1);
        cache.get_or_try_build(v, || build_ok("old")).await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.peek(v).as_deref().map(String::as_str), Some("old"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.peek(v).is_none());
        let fresh = cache.get_or_try_build(v, || build_ok("new")).await.unwrap();
        assert_eq!(*fresh, "new");
        assert_eq!(cache.stats().builds, 2);
    }

    #[tokio::test]
    async fn test_invalidate_before_and_lru_bound() {
        let cache = make_cache(60, 2);
        for n in 1..=3 {
            cache.get_or_try_build(SnapshotVersion(n), || build_ok("x")).await.unwrap();
        }
        // Capacity two: version 1 evicted.
        assert_eq!(cache.stats().len, 2);
        assert!(cache.peek(SnapshotVersion(1)).is_none());

        assert_eq!(cache.invalidate_before(SnapshotVersion(3)), 1);
        assert!(cache.peek(SnapshotVersion(3)).is_some());
        cache.clear();
        assert_eq!(cache.stats().len, 0);
    }

    #[tokio::test]
    async fn test_disabled_always_builds() {
        let cache: SnapshotCache<String> = SnapshotCache::new(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        cache.get_or_try_build(SnapshotVersion(1), || build_ok("a")).await.unwrap();
        cache.get_or_try_build(SnapshotVersion(1), || build_ok("b")).await.unwrap();
        let stats = cache.stats();
        assert_eq!((stats.builds, stats.cap), (2, 0));
    }
}
