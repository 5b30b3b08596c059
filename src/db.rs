use serde::Serialize;
use sqlx::{mysql::MySqlPoolOptions, MySqlPool};

use crate::config::DbConfig;
use crate::errors::{AppError, ResultExt};

/// A single MySQL connection, wrapped in a one-slot pool so session
/// variables (`FOREIGN_KEY_CHECKS`) stick across statements.
pub struct Database {
    pub pool: MySqlPool,
    pub database: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub version: String,
    pub database: Option<String>,
}

impl Database {
    pub async fn connect(config: &DbConfig) -> Result<Self, AppError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .acquire_timeout(config.connect_timeout)
            .connect_with(config.connect_options())
            .await
            .with_context(|| format!("Failed to connect to {}", config.redacted()))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("Connection check failed")?;

        tracing::info!("Connected to {}", config.redacted());

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    pub async fn server_info(&self) -> Result<ServerInfo, AppError> {
        let (version, database): (String, Option<String>) =
            sqlx::query_as("SELECT CAST(VERSION() AS CHAR), CAST(DATABASE() AS CHAR)")
                .fetch_one(&self.pool)
                .await
                .context("Failed to read server info")?;

        Ok(ServerInfo { version, database })
    }

    pub async fn close(self) {
        self.pool.close().await;
        tracing::debug!("Database connection closed");
    }
}
