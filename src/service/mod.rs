//! Edition Graph REST Service
//!
//! Exposes the catalog engine as a REST API.
//!
//! ## Endpoints
//!
//! - `GET /api/editions/:id/successors` - Ranked direct successors
//! - `GET /api/editions/:id/prerequisites` - Transitive prerequisites
//! - `GET /api/editions/:id/reading-path` - Best-first reading path
//! - `GET /api/editions/:id/similar` - Editions sharing content
//! - `GET /api/path?from=&to=` - Fewest-hop route
//! - `POST /api/reading-order` - Topological order over a set
//! - `GET /api/overlap?a=&b=` - Pairwise overlap
//! - `POST /api/overlap/aggregate` - Coverage by an owned collection
//! - `GET /api/duplicates` - Duplicate groups with canonical picks
//! - `POST /api/duplicates/canonical` - Canonical pick for a given group
//! - `POST /api/purchase-plan` - Purchase plan for a reading path
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//!
//! Every query answer is wrapped as `{snapshot_version, value, warnings}`.
//! An unavailable snapshot is `503` with `Retry-After`; an unknown edition
//! is `404`.

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, record_query_metric};
pub use routes::{create_router, create_router_for, ApiError, AppState, ErrorResponse};
pub use state::{CatalogSource, CatalogSourceError, ServiceState};
