//! MySQL connection pool management.

use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::MySqlPool;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::DatabaseConfig;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to create pool: {0}")]
    PoolCreationFailed(#[source] sqlx::Error),
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(3),
        }
    }
}

/// Create a connection pool for the configured database.
pub async fn create_pool(
    database: &DatabaseConfig,
    config: Option<PoolConfig>,
) -> Result<MySqlPool, ConnectionError> {
    let config = config.unwrap_or_else(|| PoolConfig {
        max_connections: database.max_connections,
        ..PoolConfig::default()
    });

    let connect_options = MySqlConnectOptions::new()
        .host(&database.host)
        .port(database.port)
        .database(&database.database)
        .username(&database.user)
        .password(&database.password);

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_options)
        .await
        .map_err(ConnectionError::PoolCreationFailed)?;

    Ok(pool)
}

/// Verify the pool can reach the database.
pub async fn test_connection(pool: &MySqlPool) -> Result<(), ConnectionError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(ConnectionError::ConnectionFailed)?;
    Ok(())
}
