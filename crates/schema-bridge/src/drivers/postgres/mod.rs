//! PostgreSQL driver.
//!
//! Implements the capability interface over `information_schema` and
//! `pg_catalog`, and the reader/writer seams over a deadpool connection
//! pool.

mod data;
mod introspect;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::info;

use crate::config::EndpointConfig;
use crate::core::identifier::quote_pg;
use crate::core::traits::DatabaseEngine;
use crate::drivers::common::SslMode;
use crate::error::{BridgeError, Result};

/// Default pool size when the endpoint does not set one.
const DEFAULT_POOL_SIZE: usize = 8;

/// A connected PostgreSQL engine.
pub struct PostgresEngine {
    pool: Pool,
    schema: String,
}

impl PostgresEngine {
    /// Connect to PostgreSQL and verify the connection.
    pub async fn connect(config: &EndpointConfig) -> Result<Self> {
        let pg_config: PgConfig = config
            .pg_connection_string()
            .parse()
            .map_err(|e| BridgeError::Config(format!("invalid postgres config: {}", e)))?;

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let max_size = config.max_connections.unwrap_or(DEFAULT_POOL_SIZE);

        let pool = match SslMode::parse(&config.ssl_mode)?.connector()? {
            Some(tls) => {
                let mgr = Manager::from_config(pg_config, tls, mgr_config);
                Pool::builder(mgr)
                    .max_size(max_size)
                    .build()
                    .map_err(|e| BridgeError::pool(e, "creating PostgreSQL pool"))?
            }
            None => {
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(max_size)
                    .build()
                    .map_err(|e| BridgeError::pool(e, "creating PostgreSQL pool"))?
            }
        };

        // Verify the connection before handing the engine out.
        let client = pool
            .get()
            .await
            .map_err(|e| BridgeError::pool(e, "testing PostgreSQL connection"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{} (schema {})",
            config.host.as_deref().unwrap_or("localhost"),
            config.port,
            config.database.as_deref().unwrap_or_default(),
            config.schema,
        );

        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    /// The schema this engine introspects and writes into.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub(crate) async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| BridgeError::pool(e, "getting PostgreSQL connection"))
    }

    /// Schema-qualified, quoted table reference.
    pub(crate) fn qualified(&self, table: &str) -> Result<String> {
        Ok(format!("{}.{}", quote_pg(&self.schema)?, quote_pg(table)?))
    }
}

#[async_trait]
impl DatabaseEngine for PostgresEngine {
    async fn close(&self) {
        self.pool.close();
    }
}
