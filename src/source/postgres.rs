//! PostgreSQL snapshot source for production use.
//!
//! Reads the catalog tables:
//! - `collected_editions`: one row per edition
//! - `edition_issues`: structured issue rows keyed by `edition_id`
//! - `connections`: typed relationships between catalog entities
//!
//! The snapshot version is the latest `updated_at` across the three tables,
//! in milliseconds since the epoch.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::HashMap;
use std::time::Duration;

use super::SnapshotSource;
use crate::ingest::{CatalogSnapshot, RawConnection, RawEdition, RawIssue, StrengthScale};
use crate::types::SnapshotVersion;

/// Configuration for PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/catalog".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

/// Error type for PostgreSQL source.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// PostgreSQL snapshot source.
pub struct PostgresSnapshotSource {
    pool: PgPool,
}

impl PostgresSnapshotSource {
    /// Create a source with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a source from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    fn parse_edition_row(row: &PgRow) -> Result<RawEdition, sqlx::Error> {
        let cover_price: Option<f64> = row.try_get("cover_price")?;
        let page_count: Option<i32> = row.try_get("page_count")?;
        Ok(RawEdition {
            id: Value::String(row.try_get("id")?),
            slug: row.try_get("slug")?,
            title: row.try_get("title")?,
            issues: None,
            issues_collected: row.try_get("issues_collected")?,
            print_status: row.try_get("print_status")?,
            cover_price: cover_price.map(Value::from).unwrap_or(Value::Null),
            importance: row.try_get("importance")?,
            format: row.try_get("format")?,
            cover_image_url: row.try_get("cover_image_url")?,
            isbn: row.try_get("isbn")?,
            release_date: row.try_get("release_date")?,
            page_count: page_count.map(Value::from).unwrap_or(Value::Null),
            synopsis: row.try_get("synopsis")?,
        })
    }

    fn parse_connection_row(row: &PgRow) -> Result<RawConnection, sqlx::Error> {
        let strength: Option<f64> = row.try_get("strength")?;
        Ok(RawConnection {
            source_type: row.try_get("source_type")?,
            source_id: Value::String(row.try_get("source_id")?),
            target_type: row.try_get("target_type")?,
            target_id: Value::String(row.try_get("target_id")?),
            connection_type: row.try_get("connection_type")?,
            strength: strength.map(Value::from).unwrap_or(Value::Null),
        })
    }
}

#[async_trait]
impl SnapshotSource for PostgresSnapshotSource {
    type Error = PostgresError;

    async fn current_version(&self) -> Result<SnapshotVersion, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(
                (EXTRACT(EPOCH FROM GREATEST(
                    (SELECT MAX(updated_at) FROM collected_editions),
                    (SELECT MAX(updated_at) FROM edition_issues),
                    (SELECT MAX(updated_at) FROM connections)
                )) * 1000)::BIGINT,
                0
            ) AS version
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        let version: i64 = row.try_get("version")?;
        Ok(SnapshotVersion(version.max(0) as u64))
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn fetch_snapshot(&self) -> Result<CatalogSnapshot, Self::Error> {
        let version = self.current_version().await?;

        let edition_rows = sqlx::query(
            r#"
            SELECT id::text AS id, slug, title, issues_collected, print_status,
                   cover_price::float8 AS cover_price, importance, format,
                   cover_image_url, isbn, release_date::text AS release_date,
                   page_count, synopsis
            FROM collected_editions
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let issue_rows = sqlx::query(
            r#"
            SELECT edition_id::text AS edition_id, series_name,
                   issue_number::text AS issue_number, is_annual
            FROM edition_issues
            ORDER BY edition_id, series_name, is_annual, issue_number
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let connection_rows = sqlx::query(
            r#"
            SELECT source_type, source_id::text AS source_id,
                   target_type, target_id::text AS target_id,
                   connection_type, strength::float8 AS strength
            FROM connections
            ORDER BY source_id, target_id, connection_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut issues: HashMap<String, Vec<RawIssue>> = HashMap::new();
        for row in &issue_rows {
            let edition_id: String = row.try_get("edition_id")?;
            let series_name: Option<String> = row.try_get("series_name")?;
            let issue_number: Option<String> = row.try_get("issue_number")?;
            let is_annual: Option<bool> = row.try_get("is_annual")?;
            issues.entry(edition_id).or_default().push(RawIssue {
                series_name: series_name.unwrap_or_default(),
                issue_number: issue_number.map(Value::String).unwrap_or(Value::Null),
                is_annual: is_annual.unwrap_or(false),
            });
        }

        let mut editions = edition_rows
            .iter()
            .map(Self::parse_edition_row)
            .collect::<Result<Vec<_>, _>>()?;
        for edition in &mut editions {
            if let Value::String(id) = &edition.id {
                edition.issues = issues.remove(id);
            }
        }

        let connections = connection_rows
            .iter()
            .map(Self::parse_connection_row)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            snapshot_version = version.0,
            edition_rows = editions.len(),
            issue_rows = issue_rows.len(),
            connection_rows = connections.len(),
            "fetched catalog from database"
        );

        Ok(CatalogSnapshot {
            version,
            fetched_at: Utc::now(),
            editions,
            connections,
            strength_scale: StrengthScale::Store,
        })
    }
}
