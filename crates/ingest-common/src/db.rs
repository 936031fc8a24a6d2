use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::time::Duration;

use crate::error::IngestError;

/// Connection settings for the ingestion pool. Both drivers write through the
/// same pool, so `max_connections` bounds total write concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// Applied with `SET statement_timeout` on every new connection.
    pub statement_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            statement_timeout: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolSettings {
    fn statement_timeout_sql(&self) -> String {
        format!("SET statement_timeout = '{}ms'", self.statement_timeout.as_millis())
    }
}

pub async fn create_pool(database_url: &str, settings: PoolSettings) -> Result<PgPool, IngestError> {
    let timeout_sql = settings.statement_timeout_sql();

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .after_connect(move |conn, _meta| {
            let timeout_sql = timeout_sql.clone();
            Box::pin(async move {
                conn.execute(timeout_sql.as_str()).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), IngestError> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| IngestError::Internal(format!("Migration failed: {}", e)))
}
