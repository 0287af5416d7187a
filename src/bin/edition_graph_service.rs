//! Edition Graph Service Binary
//!
//! Runs the catalog engine as a REST API service:
//! - Structured JSON logging
//! - Request tracing with correlation IDs
//! - Graceful shutdown handling
//! - Health check endpoints
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (feature `postgres`); when
//!   unset, the catalog is read from `CATALOG_SNAPSHOT_PATH`
//! - `CATALOG_SNAPSHOT_PATH`: JSON catalog file (default: catalog.json)
//! - `CATALOG_CACHE_TTL_SECS`, `CATALOG_CACHE_MAX_ENTRIES`,
//!   `CATALOG_FETCH_TIMEOUT_SECS`: engine settings
//! - `DUPLICATE_THRESHOLD`, `CYCLE_POLICY`: policy settings
//! - `PORT`: Service port (default: 8002)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! CATALOG_SNAPSHOT_PATH=./catalog.json cargo run --bin edition_graph_service --features service
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use edition_graph::engine::EngineConfig;
use edition_graph::service::{create_router, CatalogSource, ServiceState};
use edition_graph::JsonFileSource;

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "edition_graph=info,edition_graph_service=info,tower_http=info,sqlx=warn".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

/// Request logging middleware that adds correlation ID and timing
async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let trace_id = request
        .headers()
        .get("X-Request-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    let span = info_span!(
        "request",
        trace_id = %trace_id,
        method = %method,
        path = %uri,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    span.record("status", status);
    span.record("latency_ms", latency.as_millis() as u64);

    info!(
        target: "edition_graph_service::access",
        trace_id = %trace_id,
        method = %method,
        path = %uri,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request completed"
    );

    response
}

/// Pick the snapshot source: PostgreSQL when configured, else the JSON file.
async fn connect_source() -> Result<CatalogSource, Box<dyn std::error::Error>> {
    #[cfg(feature = "postgres")]
    if std::env::var("DATABASE_URL").is_ok() {
        use edition_graph::PostgresSnapshotSource;

        info!("Connecting to PostgreSQL...");
        let connect_start = Instant::now();
        let source = match tokio::time::timeout(std::time::Duration::from_secs(30), PostgresSnapshotSource::from_env())
            .await
        {
            Ok(Ok(source)) => source,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                return Err(e.into());
            }
            Err(_) => {
                tracing::error!("PostgreSQL connection timeout after 30s");
                return Err("Database connection timeout".into());
            }
        };
        info!(
            latency_ms = connect_start.elapsed().as_millis() as u64,
            "PostgreSQL connection established"
        );
        return Ok(CatalogSource::Postgres(source));
    }

    let path = std::env::var("CATALOG_SNAPSHOT_PATH").unwrap_or_else(|_| "catalog.json".to_string());
    info!(path = %path, "Serving catalog from JSON file");
    Ok(CatalogSource::File(JsonFileSource::new(path)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    let build_sha = option_env!("BUILD_SHA").unwrap_or("dev");

    info!(version = version, build_sha = build_sha, "Starting Edition Graph Service");

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8002);

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    let source = connect_source().await?;
    let config = EngineConfig::from_env();
    info!(
        policy_version = %config.policy.version,
        policy_hash = %config.policy.params_hash(),
        "Engine policy loaded"
    );
    let state = ServiceState::new(source, config);

    // Warm the cache; a failure here only delays readiness.
    match state.engine.catalog().await {
        Ok(catalog) => info!(
            snapshot_version = catalog.version.0,
            edition_count = catalog.graph.edition_count(),
            "Initial catalog loaded"
        ),
        Err(e) => tracing::warn!(error = %e, "Initial catalog load failed"),
    }

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = create_router(state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(address = %addr, version = version, "Edition Graph Service listening");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
            _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
        }
    };

    info!("Ready to accept connections");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await?;

    info!("Edition Graph Service shutdown complete");

    Ok(())
}
