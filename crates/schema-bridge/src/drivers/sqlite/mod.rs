//! SQLite driver.
//!
//! Implements the capability interface over `sqlite_master` and the
//! PRAGMA family, and the reader/writer seams over a sqlx pool.

mod data;
mod introspect;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use crate::config::EndpointConfig;
use crate::core::traits::DatabaseEngine;
use crate::error::Result;

/// A connected SQLite engine.
pub struct SqliteEngine {
    pool: SqlitePool,
}

impl SqliteEngine {
    /// Open (or create) the database file and verify the connection.
    pub async fn connect(config: &EndpointConfig) -> Result<Self> {
        // Each pooled connection to ":memory:" would get its own
        // database, so in-memory endpoints are capped at one.
        let max_connections = if config.is_memory() {
            1
        } else {
            config.max_connections.unwrap_or(4) as u32
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(&config.sqlite_url())
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        info!(
            "Opened SQLite database: {}",
            config
                .path
                .as_deref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| ":memory:".to_string())
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by embedders that already hold one).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseEngine for SqliteEngine {
    async fn close(&self) {
        self.pool.close().await;
    }
}
