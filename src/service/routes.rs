//! Axum routes for the edition graph service.

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::CacheStats;
use crate::engine::{EngineError, QueryResult};
use crate::overlap::{AggregateOverlap, DuplicateGroup, DuplicateResolution, PairOverlap, SimilarEdition};
use crate::pathfinder::{NextRead, PathOutcome, PrerequisiteChain, ReadingOrder, ReadingStep};
use crate::planner::PurchasePlan;
use crate::source::SnapshotSource;
use crate::types::{EditionId, Importance, SnapshotVersion};
use crate::CATALOG_SCHEMA_VERSION;

use super::middleware::{metrics_middleware, record_query_metric};
use super::state::{CatalogSource, ServiceState};

/// Type alias for the service state with the runtime-selected source.
pub type AppState = ServiceState<CatalogSource>;

type Shared<S> = State<Arc<ServiceState<S>>>;
type ApiResult<T> = Result<Json<QueryResult<T>>, ApiError>;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query for a shortest path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathQuery {
    /// Start edition.
    pub from: EditionId,
    /// Target edition.
    pub to: EditionId,
}

/// Query for pairwise overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapQuery {
    /// First edition.
    pub a: EditionId,
    /// Second edition.
    pub b: EditionId,
}

/// Query for content-similar editions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimilarQuery {
    /// Minimum overlap fraction on either side.
    pub min_ratio: Option<f64>,
}

/// Query for a reading path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingPathQuery {
    /// Comma-separated importance tiers to emit.
    pub importance: Option<String>,
}

/// Request for aggregate coverage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRequest {
    /// Candidate edition.
    pub candidate: EditionId,
    /// Owned editions, oldest acquisition first.
    #[serde(default)]
    pub owned: Vec<EditionId>,
}

/// Request for a purchase plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchasePlanRequest {
    /// Reading path in order.
    pub path: Vec<EditionId>,
    /// Owned editions.
    #[serde(default)]
    pub owned: Vec<EditionId>,
}

/// Request naming a set of editions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditionSetRequest {
    /// Editions.
    pub editions: Vec<EditionId>,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub schema_version: String,
    pub policy_version: String,
    pub policy_hash: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotHealth>,
    pub cache: CacheHealth,
    pub uptime_secs: u64,
    /// Database pool status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
}

/// The catalog currently served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHealth {
    pub version: SnapshotVersion,
    pub fingerprint: String,
    pub edition_count: usize,
    pub connection_count: usize,
    pub warning_count: usize,
}

/// Snapshot cache counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub len: usize,
    pub cap: usize,
    pub hits: u64,
    pub misses: u64,
    pub builds: u64,
}

impl From<CacheStats> for CacheHealth {
    fn from(s: CacheStats) -> Self {
        Self {
            len: s.len,
            cap: s.cap,
            hits: s.hits,
            misses: s.misses,
            builds: s.builds,
        }
    }
}

/// Database health information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub pool_size: u32,
    pub pool_idle: usize,
    pub pool_max: u32,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response with snapshot status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_version: Option<SnapshotVersion>,
    pub details: Option<String>,
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Error returned by route handlers.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
    retry_after: Option<Duration>,
}

impl ApiError {
    fn bad_request(code: &str, error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse::new(code, error),
            retry_after: None,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let message = e.to_string();
        match e {
            EngineError::SnapshotUnavailable { reason, retry_after } => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: ErrorResponse::new("SNAPSHOT_UNAVAILABLE", message).with_details(reason),
                retry_after: Some(retry_after),
            },
            EngineError::UnknownEdition(id) => Self {
                status: StatusCode::NOT_FOUND,
                body: ErrorResponse::new("EDITION_NOT_FOUND", message).with_details(id.to_string()),
                retry_after: None,
            },
            EngineError::Cancelled => Self {
                // Client closed request.
                status: StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT),
                body: ErrorResponse::new("CANCELLED", message),
                retry_after: None,
            },
            EngineError::InvalidRequest(_) => Self::bad_request("INVALID_REQUEST", message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(
            code = %self.body.code,
            error = %self.body.error,
            status = self.status.as_u16(),
            "Request error"
        );
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(retry_after) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs().max(1)));
        }
        response
    }
}

fn finish<T>(query: &str, start: Instant, result: Result<QueryResult<T>, EngineError>) -> ApiResult<T> {
    let latency_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(answer) => {
            record_query_metric(query, "ok", Some(answer.snapshot_version.0), latency_ms);
            Ok(Json(answer))
        }
        Err(e) => {
            record_query_metric(query, "error", None, latency_ms);
            Err(e.into())
        }
    }
}

fn parse_importance(raw: Option<&str>) -> Result<Option<Vec<Importance>>, ApiError> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    raw.split(',')
        .map(|tier| {
            Importance::from_str(tier)
                .ok_or_else(|| ApiError::bad_request("INVALID_IMPORTANCE", format!("Unknown importance tier: {tier}")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn successors_handler<S: SnapshotSource + 'static>(
    State(state): Shared<S>,
    Path(id): Path<EditionId>,
) -> ApiResult<Vec<NextRead>> {
    let start = Instant::now();
    finish("successors", start, state.engine.successors(&id).await)
}

async fn prerequisites_handler<S: SnapshotSource + 'static>(
    State(state): Shared<S>,
    Path(id): Path<EditionId>,
) -> ApiResult<PrerequisiteChain> {
    let start = Instant::now();
    finish("prerequisites", start, state.engine.prerequisites(&id, None).await)
}

async fn reading_path_handler<S: SnapshotSource + 'static>(
    State(state): Shared<S>,
    Path(id): Path<EditionId>,
    Query(query): Query<ReadingPathQuery>,
) -> ApiResult<Vec<ReadingStep>> {
    let start = Instant::now();
    let importance = parse_importance(query.importance.as_deref())?;
    finish("reading_path", start, state.engine.reading_path(&id, importance, None).await)
}

async fn similar_handler<S: SnapshotSource + 'static>(
    State(state): Shared<S>,
    Path(id): Path<EditionId>,
    Query(query): Query<SimilarQuery>,
) -> ApiResult<Vec<SimilarEdition>> {
    let start = Instant::now();
    finish("similar", start, state.engine.similar(&id, query.min_ratio).await)
}

async fn path_handler<S: SnapshotSource + 'static>(
    State(state): Shared<S>,
    Query(query): Query<PathQuery>,
) -> ApiResult<PathOutcome> {
    let start = Instant::now();
    finish(
        "shortest_path",
        start,
        state.engine.shortest_path(&query.from, &query.to, None).await,
    )
}

async fn overlap_handler<S: SnapshotSource + 'static>(
    State(state): Shared<S>,
    Query(query): Query<OverlapQuery>,
) -> ApiResult<PairOverlap> {
    let start = Instant::now();
    finish("overlap", start, state.engine.overlap(&query.a, &query.b).await)
}

async fn aggregate_handler<S: SnapshotSource + 'static>(
    State(state): Shared<S>,
    Json(request): Json<AggregateRequest>,
) -> ApiResult<AggregateOverlap> {
    let start = Instant::now();
    finish(
        "aggregate",
        start,
        state.engine.aggregate(&request.candidate, &request.owned).await,
    )
}

async fn purchase_plan_handler<S: SnapshotSource + 'static>(
    State(state): Shared<S>,
    Json(request): Json<PurchasePlanRequest>,
) -> ApiResult<PurchasePlan> {
    let start = Instant::now();
    finish(
        "purchase_plan",
        start,
        state.engine.purchase_plan(&request.path, &request.owned).await,
    )
}

async fn reading_order_handler<S: SnapshotSource + 'static>(
    State(state): Shared<S>,
    Json(request): Json<EditionSetRequest>,
) -> ApiResult<ReadingOrder> {
    let start = Instant::now();
    finish(
        "reading_order",
        start,
        state.engine.reading_order(&request.editions, None).await,
    )
}

async fn duplicates_handler<S: SnapshotSource + 'static>(State(state): Shared<S>) -> ApiResult<Vec<DuplicateGroup>> {
    let start = Instant::now();
    finish("duplicates", start, state.engine.duplicates().await)
}

async fn canonical_handler<S: SnapshotSource + 'static>(
    State(state): Shared<S>,
    Json(request): Json<EditionSetRequest>,
) -> ApiResult<DuplicateResolution> {
    let start = Instant::now();
    finish("canonical", start, state.engine.canonical(&request.editions).await)
}

/// Health check endpoint (detailed).
///
/// Reports the cached catalog without fetching.
async fn health_handler<S: SnapshotSource + 'static>(State(state): Shared<S>) -> Json<HealthResponse> {
    let engine = &state.engine;
    let snapshot = engine.cached_catalog().map(|c| SnapshotHealth {
        version: c.version,
        fingerprint: c.fingerprint.clone(),
        edition_count: c.graph.edition_count(),
        connection_count: c.graph.connection_count(),
        warning_count: c.warnings.len(),
    });

    Json(HealthResponse {
        status: if snapshot.is_some() { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: CATALOG_SCHEMA_VERSION.to_string(),
        policy_version: engine.policy().version.clone(),
        policy_hash: engine.policy().params_hash(),
        source: engine.source().kind().to_string(),
        snapshot,
        cache: engine.cache_stats().into(),
        uptime_secs: state.uptime_secs(),
        database: None,
    })
}

/// Health for the runtime-selected source, with database pool stats.
async fn app_health_handler(State(state): Shared<CatalogSource>) -> Json<HealthResponse> {
    #[cfg_attr(not(feature = "postgres"), allow(unused_mut))]
    let Json(mut health) = health_handler(State(Arc::clone(&state))).await;
    #[cfg(feature = "postgres")]
    {
        health.database = state.engine.source().pool_stats().map(|p| DatabaseHealth {
            pool_size: p.size,
            pool_idle: p.idle,
            pool_max: p.max,
        });
    }
    Json(health)
}

/// Liveness probe endpoint.
///
/// Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Ready once a catalog can be served: 200 with its version, 503 otherwise.
async fn readiness_handler<S: SnapshotSource + 'static>(
    State(state): Shared<S>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    match state.engine.catalog().await {
        Ok(catalog) => Ok(Json(ReadinessResponse {
            ready: true,
            snapshot_version: Some(catalog.version),
            details: None,
        })),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                snapshot_version: None,
                details: Some(e.to_string()),
            }),
        )),
    }
}

// ============================================================================
// Router Construction
// ============================================================================

fn api_routes<S: SnapshotSource + 'static>() -> Router<Arc<ServiceState<S>>> {
    Router::new()
        // Traversal
        .route("/api/editions/:id/successors", get(successors_handler::<S>))
        .route("/api/editions/:id/prerequisites", get(prerequisites_handler::<S>))
        .route("/api/editions/:id/reading-path", get(reading_path_handler::<S>))
        .route("/api/path", get(path_handler::<S>))
        .route("/api/reading-order", post(reading_order_handler::<S>))
        // Overlap
        .route("/api/editions/:id/similar", get(similar_handler::<S>))
        .route("/api/overlap", get(overlap_handler::<S>))
        .route("/api/overlap/aggregate", post(aggregate_handler::<S>))
        .route("/api/duplicates", get(duplicates_handler::<S>))
        .route("/api/duplicates/canonical", post(canonical_handler::<S>))
        // Purchase planning
        .route("/api/purchase-plan", post(purchase_plan_handler::<S>))
        // Health checks
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
}

/// Create the router over any snapshot source.
pub fn create_router_for<S: SnapshotSource + 'static>(state: ServiceState<S>) -> Router {
    api_routes::<S>()
        .route("/health", get(health_handler::<S>))
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(Arc::new(state))
}

/// Create the Axum router for the edition graph service.
pub fn create_router(state: AppState) -> Router {
    api_routes::<CatalogSource>()
        .route("/health", get(app_health_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(Arc::new(state))
}
