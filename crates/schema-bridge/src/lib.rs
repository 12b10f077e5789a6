//! # schema-bridge
//!
//! Schema discovery, drift watching, and cross-engine migration between
//! SQLite and PostgreSQL.
//!
//! The library reconciles two incompatible system catalogs (PRAGMA
//! output vs. information_schema/pg_catalog) into one canonical model,
//! infers relationships that were never declared (including
//! many-to-many via a junction-table heuristic), detects structural
//! drift by content hashing, and moves schema plus data across the
//! type-system boundary with per-table failure tolerance:
//!
//! - **Discovery** via a per-dialect capability interface
//! - **Relationship inference** from foreign keys alone
//! - **Drift watching** with canonical schema hashing and backoff
//! - **Schema diffing** within and across dialects
//! - **Batched data migration** with parallel workers and row-count
//!   verification
//!
//! ## Example
//!
//! ```rust,no_run
//! use schema_bridge::{Config, MigrationManager};
//!
//! #[tokio::main]
//! async fn main() -> schema_bridge::Result<()> {
//!     let config = Config::load("bridge.yaml")?;
//!     let manager = MigrationManager::connect(config).await?;
//!     let result = manager.migrate().await?;
//!     println!("Migrated {} rows", result.rows_transferred);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dialect;
pub mod diff;
pub mod discover;
pub mod drivers;
pub mod error;
pub mod migrate;
pub mod relations;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use config::{Config, EndpointConfig, MigrationOptions};
pub use crate::core::schema::{
    ColumnInfo, ForeignKeyInfo, IndexInfo, RelationshipInfo, RelationshipKind, SchemaChange,
    SchemaChangeKind, SchemaInfo, TableInfo, ViewInfo,
};
pub use crate::core::traits::{DatabaseEngine, Introspector, SourceReader, TargetWriter};
pub use crate::core::value::{Batch, SqlNullType, SqlValue};
pub use dialect::{Dialect, DialectCapabilities};
pub use diff::{compare_schemas, diff_schemas, SchemaComparisonResult};
pub use discover::{DiscoverOptions, SchemaDiscovery};
pub use drivers::{connect_engine, PostgresEngine, SqliteEngine};
pub use error::{BridgeError, Result};
pub use migrate::{
    MigrationManager, MigrationProgress, MigrationResult, SyncOptions, SyncResult,
};
pub use relations::RelationshipEngine;
pub use watch::{schema_hash, SchemaWatcher, WatchOptions};
