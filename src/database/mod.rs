pub mod error;
pub mod job_repository;
pub mod order_repository;
pub mod payment_repository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use self::error::DatabaseError;
use crate::config::DatabaseConfig;

const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(1800);

/// Open the connection pool described by the application configuration and
/// verify it with a test acquire.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connection_timeout_secs = config.connection_timeout,
        "connecting database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .idle_timeout(Duration::from_secs(
            config.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS),
        ))
        .max_lifetime(MAX_CONNECTION_LIFETIME)
        .connect(&config.url)
        .await
        .map_err(DatabaseError::from_sqlx)?;

    pool.acquire().await.map_err(DatabaseError::from_sqlx)?;

    info!("database pool ready");
    Ok(pool)
}
