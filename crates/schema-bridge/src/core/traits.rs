//! Core traits for dialect-agnostic discovery and migration.
//!
//! [`Introspector`] is the single seam the discovery core depends on:
//! connection management and query execution live entirely behind it.
//! [`SourceReader`] and [`TargetWriter`] extend the seam for data
//! migration, and [`DatabaseEngine`] bundles all three so the factory
//! can hand out one object per connection.

use async_trait::async_trait;

use crate::core::schema::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableInfo};
use crate::core::value::Batch;
use crate::dialect::Dialect;
use crate::error::Result;

/// Capability interface over a database engine's own catalog.
///
/// Implemented once per dialect. Every method maps to one catalog
/// mechanism (PRAGMA output for SQLite, information_schema/pg_catalog
/// for PostgreSQL) and returns raw-but-typed canonical records.
#[async_trait]
pub trait Introspector: Send + Sync {
    /// The dialect this introspector speaks.
    fn dialect(&self) -> Dialect;

    /// List all user table names.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// List all view names.
    async fn list_views(&self) -> Result<Vec<String>>;

    /// Get column definitions for a table, in ordinal order.
    async fn get_columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Get secondary indexes for a table.
    async fn get_indexes(&self, table: &str) -> Result<Vec<IndexInfo>>;

    /// Get foreign key constraints for a table.
    async fn get_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>>;

    /// Get the row count for a table.
    async fn get_row_count(&self, table: &str) -> Result<i64>;

    /// Get the SQL definition of a view.
    async fn get_view_definition(&self, view: &str) -> Result<String>;
}

/// Read row batches from a source database.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Read one batch of rows from a table.
    ///
    /// Rows are returned in a deterministic order (primary key when the
    /// table has one) so that parallel workers reading disjoint
    /// offset ranges never observe the same row twice.
    async fn read_batch(&self, table: &TableInfo, offset: i64, limit: usize) -> Result<Batch>;
}

/// Write schema objects and row batches to a target database.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Execute a DDL statement (CREATE TABLE, CREATE INDEX, ALTER ...).
    async fn execute_ddl(&self, sql: &str) -> Result<()>;

    /// Check if a table exists.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Drop a table if it exists.
    async fn drop_table(&self, table: &str) -> Result<()>;

    /// Write a batch of rows, returning the number inserted.
    ///
    /// Values are coerced to the target column types before binding;
    /// a value that cannot be represented fails the batch.
    async fn write_batch(&self, table: &TableInfo, rows: &Batch) -> Result<u64>;

    /// Re-align auto-increment state with the data just loaded.
    ///
    /// No-op on engines/tables without sequence-backed keys.
    async fn reset_auto_increment(&self, table: &TableInfo) -> Result<()>;
}

/// A connected database engine: introspection plus data movement.
///
/// This is what [`connect_engine`](crate::drivers::connect_engine)
/// returns. Engines are stateless after construction (beyond their
/// connection pool) and may be shared across concurrent discovery
/// passes.
#[async_trait]
pub trait DatabaseEngine: Introspector + SourceReader + TargetWriter {
    /// Close the underlying connection pool.
    async fn close(&self);
}
