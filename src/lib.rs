//! # edition-graph
//!
//! Connection graph and issue-level content-overlap engine for catalogs of
//! collected comic editions.
//!
//! The engine answers two families of questions over one immutable catalog
//! snapshot:
//!
//! > What should I read next, and in what order?
//!
//! > Which issues do I already own, and what do I still need to buy?
//!
//! ## Architecture
//!
//! ```text
//! SnapshotSource → ingest (validate) → IssueIndex + EditionGraph → BuiltCatalog
//!                                                                      ↓
//!                                 SnapshotCache (single-flight, TTL, by version)
//!                                                                      ↓
//!                  PathFinder · OverlapEngine · PurchasePlanner → QueryResult
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same snapshot + same policy → identical answers
//! - Every ranking ends in a tie-break on edition id
//! - A built catalog is never mutated; concurrent queries share it freely
//! - Data problems become [`DataWarning`]s attached to results, never panics

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod canonical;
pub mod catalog;
pub mod engine;
pub mod graph;
pub mod index;
pub mod ingest;
pub mod overlap;
pub mod pathfinder;
pub mod planner;
pub mod policy;
pub mod source;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    Connection, ConnectionFilter, ConnectionType, DataWarning, Edition, EditionFormat, EditionId, Importance,
    IssueId, PrintStatus, SnapshotVersion,
};
pub use cache::{CacheConfig, CacheStats, SnapshotCache};
pub use canonical::{canonical_hash, canonical_hash_hex, catalog_fingerprint, to_canonical_bytes};
pub use catalog::BuiltCatalog;
pub use engine::{CatalogEngine, EngineConfig, EngineError, QueryResult};
pub use graph::EditionGraph;
pub use index::{parse_issue_list, IssueIndex};
pub use ingest::{CatalogSnapshot, RawConnection, RawEdition, RawIssue, StrengthScale};
pub use overlap::{
    AggregateOverlap, DuplicateGroup, DuplicateResolution, OverlapEngine, OverlapError, PairOverlap,
    SimilarEdition,
};
pub use pathfinder::{
    NextRead, PathError, PathFinder, PathOutcome, PrerequisiteChain, ReadingOrder, ReadingPathOptions,
    ReadingStep,
};
pub use planner::{PlanError, PurchasePlan, PurchasePlanner};
pub use policy::{CyclePolicy, EnginePolicy};
pub use source::{InMemorySnapshotSource, JsonFileSource, SnapshotSource};
#[cfg(feature = "postgres")]
pub use source::{PostgresConfig, PostgresSnapshotSource};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, CatalogSource, ServiceState};

/// Schema version of serialized query results.
/// Increment on breaking changes to any result type.
pub const CATALOG_SCHEMA_VERSION: &str = "1.0.0";

/// Default policy version identifier.
pub const DEFAULT_POLICY_VERSION: &str = "engine_policy_v1";
