/// Database layer for CampusConnect
///
/// Manages the SQLite pool and migrations, and implements the store
/// contracts from [`crate::store`] on [`SqliteStore`].

pub mod content;
pub mod forum;
pub mod notifications;
pub mod users;

use crate::error::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool and run migrations
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> WorkflowResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            WorkflowError::Internal(format!("Failed to create directory {:?}: {}", parent, e))
        })?;
    }

    let connect_options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(if options.enable_wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        })
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .acquire_timeout(options.acquire_timeout)
        .connect_with(connect_options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory pool with the schema applied.
///
/// The connection is pinned so the database survives for the pool's lifetime.
pub async fn create_memory_pool() -> WorkflowResult<SqlitePool> {
    let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run migrations embedded at compile time from ./migrations
pub async fn run_migrations(pool: &SqlitePool) -> WorkflowResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| WorkflowError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> WorkflowResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// SQLite implementation of every store contract
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> WorkflowResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| WorkflowError::Internal(format!("Invalid timestamp {}: {}", raw, e)))
}

pub(crate) fn parse_optional_timestamp(raw: Option<String>) -> WorkflowResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

pub(crate) fn parse_id(raw: &str) -> WorkflowResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| WorkflowError::Internal(format!("Invalid id {}: {}", raw, e)))
}

pub(crate) fn parse_optional_id(raw: Option<String>) -> WorkflowResult<Option<Uuid>> {
    raw.as_deref().map(parse_id).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_pool_runs_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_pool(&dir.path().join("nested/campus.sqlite"), DatabaseOptions::default())
            .await
            .unwrap();

        test_connection(&pool).await.unwrap();
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('content_items', 'participants', 'notifications', 'users')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn test_parse_helpers() {
        assert!(parse_timestamp("2025-03-01T10:00:00Z").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
        assert_eq!(parse_optional_id(None).unwrap(), None);
        assert!(parse_id("not-a-uuid").is_err());
    }
}
