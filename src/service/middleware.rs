//! Service middleware for request metrics.
//!
//! ## Metrics Logged
//!
//! All on the `edition_graph::metrics` target, aggregated from logs:
//! - `request`: path pattern, method, status, latency
//! - `query`: engine query name, outcome, snapshot version, latency

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::time::Instant;
use tracing::info;

static EDITION_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/api/editions/[^/]+").expect("edition path pattern is a valid regex"));

/// Metrics middleware that records request counts and latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "edition_graph::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Edition ids in `/api/editions/{id}/...` become `:id`.
fn normalize_path(path: &str) -> String {
    EDITION_SEGMENT.replace(path, "/api/editions/:id").to_string()
}

/// Record one engine query.
pub fn record_query_metric(query: &str, outcome: &str, snapshot_version: Option<u64>, latency_ms: u64) {
    info!(
        target: "edition_graph::metrics",
        metric_type = "query",
        query = query,
        outcome = outcome,
        snapshot_version = snapshot_version,
        latency_ms = latency_ms,
        "query_metric"
    );
}
