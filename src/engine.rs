//! Catalog engine: the request flow.
//!
//! ```text
//! request → source.current_version() ─┬─ cache hit ──────────────┐
//!                                     └─ miss → fetch → build ───┴→ query → QueryResult
//! ```
//!
//! Both source calls run under the fetch timeout. A timeout or source error
//! fails the request with [`EngineError::SnapshotUnavailable`]; a partial
//! catalog is never served. When the source reports a newer version, older
//! cache entries are dropped.
//!
//! Every query result carries the snapshot version it was computed from and
//! the data warnings that apply to it.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheConfig, CacheStats, SnapshotCache};
use crate::catalog::BuiltCatalog;
use crate::overlap::{
    AggregateOverlap, DuplicateGroup, DuplicateResolution, OverlapEngine, OverlapError, PairOverlap,
    SimilarEdition,
};
use crate::pathfinder::{
    NextRead, PathError, PathFinder, PathOutcome, PrerequisiteChain, ReadingOrder, ReadingPathOptions,
    ReadingStep,
};
use crate::planner::{PlanError, PurchasePlan, PurchasePlanner};
use crate::policy::EnginePolicy;
use crate::source::SnapshotSource;
use crate::types::{DataWarning, EditionId, Importance, SnapshotVersion};

/// Error type for engine queries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// No snapshot could be produced within the fetch timeout.
    #[error("Snapshot unavailable: {reason}")]
    SnapshotUnavailable {
        /// What went wrong.
        reason: String,
        /// Suggested wait before retrying.
        retry_after: Duration,
    },
    /// Edition not in the catalog.
    #[error("Edition not found: {0}")]
    UnknownEdition(EditionId),
    /// The caller cancelled the query.
    #[error("Query cancelled")]
    Cancelled,
    /// Request arguments cannot be evaluated.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<PathError> for EngineError {
    fn from(e: PathError) -> Self {
        match e {
            PathError::UnknownEdition(id) => Self::UnknownEdition(id),
            PathError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<OverlapError> for EngineError {
    fn from(e: OverlapError) -> Self {
        match e {
            OverlapError::UnknownEdition(id) => Self::UnknownEdition(id),
            OverlapError::EmptyGroup => Self::InvalidRequest(e.to_string()),
        }
    }
}

impl From<PlanError> for EngineError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::UnknownEdition(id) => Self::UnknownEdition(id),
            PlanError::InvalidRequest(reason) => Self::InvalidRequest(reason),
        }
    }
}

/// A query answer bound to the snapshot it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult<T> {
    /// Snapshot version of the catalog used.
    pub snapshot_version: SnapshotVersion,
    /// The answer.
    pub value: T,
    /// Catalog data warnings plus any raised by this query.
    pub warnings: Vec<DataWarning>,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Thresholds and traversal limits.
    pub policy: EnginePolicy,
    /// Snapshot cache settings.
    pub cache: CacheConfig,
    /// Limit on each call to the snapshot source.
    pub fetch_timeout: Duration,
    /// Retry hint returned with `SnapshotUnavailable`.
    pub retry_after: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: EnginePolicy::default(),
            cache: CacheConfig::default(),
            fetch_timeout: Duration::from_secs(10),
            retry_after: Duration::from_secs(5),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// - `CATALOG_CACHE_TTL_SECS` (default 300)
    /// - `CATALOG_CACHE_MAX_ENTRIES` (default 16)
    /// - `CATALOG_CACHE_ENABLED` (default true)
    /// - `CATALOG_FETCH_TIMEOUT_SECS` (default 10)
    /// - `CATALOG_RETRY_AFTER_SECS` (default 5)
    ///
    /// Policy settings come from [`EnginePolicy::from_env`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            policy: EnginePolicy::from_env(),
            cache: CacheConfig {
                ttl: env_parse("CATALOG_CACHE_TTL_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache.ttl),
                max_entries: env_parse("CATALOG_CACHE_MAX_ENTRIES").unwrap_or(defaults.cache.max_entries),
                enabled: env_parse("CATALOG_CACHE_ENABLED").unwrap_or(defaults.cache.enabled),
            },
            fetch_timeout: env_parse("CATALOG_FETCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            retry_after: env_parse("CATALOG_RETRY_AFTER_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_after),
        }
    }
}

/// Serves catalog queries over a snapshot source.
pub struct CatalogEngine<S: SnapshotSource> {
    source: Arc<S>,
    cache: SnapshotCache<BuiltCatalog>,
    config: EngineConfig,
    latest_version: AtomicU64,
}

impl<S: SnapshotSource> CatalogEngine<S> {
    /// Create an engine.
    pub fn new(source: Arc<S>, config: EngineConfig) -> Self {
        info!(
            policy_version = %config.policy.version,
            policy_hash = %config.policy.params_hash(),
            cache_ttl_secs = config.cache.ttl.as_secs(),
            cache_max_entries = config.cache.max_entries,
            fetch_timeout_ms = config.fetch_timeout.as_millis() as u64,
            "catalog engine configured"
        );
        Self {
            source,
            cache: SnapshotCache::new(config.cache.clone()),
            config,
            latest_version: AtomicU64::new(0),
        }
    }

    /// The snapshot source.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Active policy.
    pub fn policy(&self) -> &EnginePolicy {
        &self.config.policy
    }

    /// Cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Latest snapshot version seen, if any request has resolved one.
    pub fn latest_version(&self) -> Option<SnapshotVersion> {
        match self.latest_version.load(Ordering::Acquire) {
            0 => None,
            v => Some(SnapshotVersion(v)),
        }
    }

    /// Cached catalog for the latest seen version, without fetching.
    pub fn cached_catalog(&self) -> Option<Arc<BuiltCatalog>> {
        self.latest_version().and_then(|v| self.cache.peek(v))
    }

    /// Drop all cached catalogs.
    pub fn invalidate(&self) {
        self.cache.clear();
    }

    fn unavailable(&self, reason: String) -> EngineError {
        warn!(reason = %reason, "snapshot unavailable");
        EngineError::SnapshotUnavailable {
            reason,
            retry_after: self.config.retry_after,
        }
    }

    async fn resolve_version(&self) -> Result<SnapshotVersion, EngineError> {
        let version = match tokio::time::timeout(self.config.fetch_timeout, self.source.current_version()).await {
            Ok(Ok(version)) => version,
            Ok(Err(e)) => return Err(self.unavailable(format!("version lookup failed: {e}"))),
            Err(_) => return Err(self.unavailable("version lookup timed out".to_string())),
        };

        let previous = self.latest_version.fetch_max(version.0, Ordering::AcqRel);
        if version.0 > previous {
            let dropped = self.cache.invalidate_before(version);
            info!(
                snapshot_version = version.0,
                previous_version = previous,
                dropped_entries = dropped,
                "snapshot version advanced"
            );
        }
        Ok(version)
    }

    /// The built catalog for the source's current version.
    pub async fn catalog(&self) -> Result<Arc<BuiltCatalog>, EngineError> {
        let version = self.resolve_version().await?;
        self.cache
            .get_or_try_build(version, || async {
                let fetched = tokio::time::timeout(self.config.fetch_timeout, self.source.fetch_snapshot()).await;
                let snapshot = match fetched {
                    Ok(Ok(snapshot)) => snapshot,
                    Ok(Err(e)) => return Err(self.unavailable(format!("snapshot fetch failed: {e}"))),
                    Err(_) => return Err(self.unavailable("snapshot fetch timed out".to_string())),
                };
                Ok(BuiltCatalog::build(&snapshot))
            })
            .await
    }

    fn respond<T>(
        &self,
        query: &'static str,
        catalog: &BuiltCatalog,
        start: Instant,
        value: T,
        extra: Vec<DataWarning>,
    ) -> QueryResult<T> {
        let mut warnings = catalog.warnings.clone();
        warnings.extend(extra);
        debug!(
            query,
            snapshot_version = catalog.version.0,
            warning_count = warnings.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "query served"
        );
        QueryResult {
            snapshot_version: catalog.version,
            value,
            warnings,
        }
    }

    fn finder<'c>(&self, catalog: &'c BuiltCatalog, cancel: Option<CancellationToken>) -> PathFinder<'c> {
        let finder = PathFinder::new(&catalog.graph);
        match cancel {
            Some(token) => finder.with_cancellation(token),
            None => finder,
        }
    }

    /// Ranked direct successors ("what's next").
    pub async fn successors(&self, id: &EditionId) -> Result<QueryResult<Vec<NextRead>>, EngineError> {
        let start = Instant::now();
        let catalog = self.catalog().await?;
        let value = PathFinder::new(&catalog.graph).whats_next(id)?;
        Ok(self.respond("successors", &catalog, start, value, Vec::new()))
    }

    /// Fewest-hop route between two editions.
    pub async fn shortest_path(
        &self,
        from: &EditionId,
        to: &EditionId,
        cancel: Option<CancellationToken>,
    ) -> Result<QueryResult<PathOutcome>, EngineError> {
        let start = Instant::now();
        let catalog = self.catalog().await?;
        let value = self.finder(&catalog, cancel).shortest_path(from, to)?;
        Ok(self.respond("shortest_path", &catalog, start, value, Vec::new()))
    }

    /// Transitive prerequisites under the configured cycle policy.
    ///
    /// Cycle warnings move from the chain into the result's warnings.
    pub async fn prerequisites(
        &self,
        id: &EditionId,
        cancel: Option<CancellationToken>,
    ) -> Result<QueryResult<PrerequisiteChain>, EngineError> {
        let start = Instant::now();
        let catalog = self.catalog().await?;
        let mut chain = self
            .finder(&catalog, cancel)
            .prerequisite_chain(id, self.config.policy.cycle_policy)?;
        let cycles = std::mem::take(&mut chain.warnings);
        Ok(self.respond("prerequisites", &catalog, start, chain, cycles))
    }

    /// Best-first reading path from `start_id`, limited by the policy.
    pub async fn reading_path(
        &self,
        start_id: &EditionId,
        importance: Option<Vec<Importance>>,
        cancel: Option<CancellationToken>,
    ) -> Result<QueryResult<Vec<ReadingStep>>, EngineError> {
        let start = Instant::now();
        let catalog = self.catalog().await?;
        let options = ReadingPathOptions {
            max_depth: self.config.policy.max_reading_depth,
            max_results: self.config.policy.max_reading_results,
            importance,
        };
        let value = self.finder(&catalog, cancel).reading_path(start_id, &options)?;
        Ok(self.respond("reading_path", &catalog, start, value, Vec::new()))
    }

    /// Topological reading order over `ids`.
    pub async fn reading_order(
        &self,
        ids: &[EditionId],
        cancel: Option<CancellationToken>,
    ) -> Result<QueryResult<ReadingOrder>, EngineError> {
        let start = Instant::now();
        let catalog = self.catalog().await?;
        let mut order = self.finder(&catalog, cancel).reading_order(ids)?;
        let cycles = std::mem::take(&mut order.warnings);
        Ok(self.respond("reading_order", &catalog, start, order, cycles))
    }

    /// Pairwise overlap.
    pub async fn overlap(&self, a: &EditionId, b: &EditionId) -> Result<QueryResult<PairOverlap>, EngineError> {
        let start = Instant::now();
        let catalog = self.catalog().await?;
        let value = OverlapEngine::new(&catalog.graph, &catalog.index).pairwise(a, b)?;
        Ok(self.respond("overlap", &catalog, start, value, Vec::new()))
    }

    /// Coverage of a candidate by an owned collection.
    pub async fn aggregate(
        &self,
        candidate: &EditionId,
        owned: &[EditionId],
    ) -> Result<QueryResult<AggregateOverlap>, EngineError> {
        let start = Instant::now();
        let catalog = self.catalog().await?;
        let value = OverlapEngine::new(&catalog.graph, &catalog.index).aggregate(candidate, owned)?;
        Ok(self.respond("aggregate", &catalog, start, value, Vec::new()))
    }

    /// Editions sharing content with `id`.
    ///
    /// `min_ratio` defaults to the policy's similarity threshold.
    pub async fn similar(
        &self,
        id: &EditionId,
        min_ratio: Option<f64>,
    ) -> Result<QueryResult<Vec<SimilarEdition>>, EngineError> {
        let start = Instant::now();
        let catalog = self.catalog().await?;
        let ratio = min_ratio.unwrap_or(self.config.policy.similarity_threshold);
        let value = OverlapEngine::new(&catalog.graph, &catalog.index).similar(id, ratio)?;
        Ok(self.respond("similar", &catalog, start, value, Vec::new()))
    }

    /// Duplicate groups across the catalog at the policy's threshold.
    pub async fn duplicates(&self) -> Result<QueryResult<Vec<DuplicateGroup>>, EngineError> {
        let start = Instant::now();
        let catalog = self.catalog().await?;
        let value = OverlapEngine::new(&catalog.graph, &catalog.index)
            .duplicate_groups(self.config.policy.duplicate_threshold)?;
        Ok(self.respond("duplicates", &catalog, start, value, Vec::new()))
    }

    /// Canonical edition among a group of duplicates.
    pub async fn canonical(&self, group: &[EditionId]) -> Result<QueryResult<DuplicateResolution>, EngineError> {
        let start = Instant::now();
        let catalog = self.catalog().await?;
        let value = OverlapEngine::new(&catalog.graph, &catalog.index).select_canonical(group)?;
        Ok(self.respond("canonical", &catalog, start, value, Vec::new()))
    }

    /// Purchase plan for a reading path.
    pub async fn purchase_plan(
        &self,
        path: &[EditionId],
        owned: &[EditionId],
    ) -> Result<QueryResult<PurchasePlan>, EngineError> {
        let start = Instant::now();
        let catalog = self.catalog().await?;
        let value = PurchasePlanner::new(&catalog.graph, &catalog.index, self.config.policy.duplicate_threshold)
            .plan(path, owned)?;
        Ok(self.respond("purchase_plan", &catalog, start, value, Vec::new()))
    }
}
