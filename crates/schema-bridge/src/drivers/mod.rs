//! Database driver implementations.
//!
//! - [`sqlite`]: embedded engine over a sqlx pool and PRAGMA catalog
//! - [`postgres`]: client/server engine over deadpool and
//!   information_schema/pg_catalog
//! - [`common`]: shared TLS utilities
//!
//! [`connect_engine`] is the factory: it resolves the dialect once, so
//! an unsupported dialect fails here rather than surfacing later as a
//! half-working service.

pub mod common;
pub mod postgres;
pub mod sqlite;

pub use common::SslMode;
pub use postgres::PostgresEngine;
pub use sqlite::SqliteEngine;

use std::sync::Arc;

use crate::config::EndpointConfig;
use crate::core::traits::DatabaseEngine;
use crate::dialect::Dialect;
use crate::error::Result;

/// Connect to the engine an endpoint describes.
///
/// # Errors
///
/// Fails fast with [`BridgeError::UnsupportedDialect`] before any
/// connection attempt when the dialect identifier is unknown.
///
/// [`BridgeError::UnsupportedDialect`]: crate::error::BridgeError::UnsupportedDialect
pub async fn connect_engine(config: &EndpointConfig) -> Result<Arc<dyn DatabaseEngine>> {
    match Dialect::parse(&config.dialect)? {
        Dialect::Sqlite => Ok(Arc::new(SqliteEngine::connect(config).await?)),
        Dialect::Postgres => Ok(Arc::new(PostgresEngine::connect(config).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_dialect_fails_before_connecting() {
        let mut config = EndpointConfig::sqlite(":memory:");
        config.dialect = "duckdb".to_string();
        let err = connect_engine(&config).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported dialect"));
    }

    #[tokio::test]
    async fn test_sqlite_memory_connects() {
        let config = EndpointConfig::sqlite(":memory:");
        let engine = connect_engine(&config).await.unwrap();
        assert_eq!(engine.dialect(), Dialect::Sqlite);
        engine.close().await;
    }
}
