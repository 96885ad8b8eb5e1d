/// Application context and dependency injection
use crate::{
    config::AppConfig,
    db::{self, DatabaseOptions, SqliteStore},
    error::WorkflowResult,
    workflow::WorkflowOrchestrator,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: SqlitePool,
    pub store: Arc<SqliteStore>,
    pub orchestrator: Arc<WorkflowOrchestrator>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: AppConfig) -> WorkflowResult<Self> {
        config.validate()?;

        let options = DatabaseOptions {
            max_connections: config.storage.max_connections,
            acquire_timeout: Duration::from_secs(config.storage.acquire_timeout_secs),
            enable_wal: true,
        };
        let pool = db::create_pool(&config.storage.database, options).await?;

        tracing::info!(
            database = %config.storage.database.display(),
            max_connections = config.storage.max_connections,
            "database ready"
        );

        Ok(Self::with_pool(config, pool))
    }

    /// Build the context over an existing, migrated pool
    pub fn with_pool(config: AppConfig, pool: SqlitePool) -> Self {
        let store = Arc::new(SqliteStore::new(pool.clone()));
        let orchestrator = Arc::new(WorkflowOrchestrator::new(
            store.clone(),
            &config.moderation,
            &config.notifications,
        ));

        Self {
            config: Arc::new(config),
            db: pool,
            store,
            orchestrator,
        }
    }
}
