//! In-memory mock engine for orchestration tests.
//!
//! Implements the full [`DatabaseEngine`] seam over plain collections,
//! with switches to make individual facets fail, so discovery
//! tolerance, watcher retries, and migration phases can be exercised
//! without a database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::schema::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableInfo, ViewInfo};
use crate::core::traits::{DatabaseEngine, Introspector, SourceReader, TargetWriter};
use crate::core::value::Batch;
use crate::dialect::Dialect;
use crate::error::{BridgeError, Result};

#[derive(Default)]
pub(crate) struct MockEngine {
    dialect: Option<Dialect>,
    tables: Mutex<Vec<TableInfo>>,
    views: Mutex<Vec<ViewInfo>>,
    rows: Mutex<HashMap<String, Batch>>,
    pub fail_columns: Mutex<HashSet<String>>,
    pub fail_indexes: Mutex<HashSet<String>>,
    pub fail_foreign_keys: Mutex<HashSet<String>>,
    pub fail_writes: Mutex<HashSet<String>>,
    pub fail_discovery: AtomicBool,
    /// Report success from write_batch without storing anything.
    pub swallow_writes: AtomicBool,
    pub executed_ddl: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn add_table(&self, table: TableInfo) {
        self.tables.lock().unwrap().push(table);
    }

    pub fn set_tables(&self, tables: Vec<TableInfo>) {
        *self.tables.lock().unwrap() = tables;
    }

    pub fn add_view(&self, view: ViewInfo) {
        self.views.lock().unwrap().push(view);
    }

    pub fn set_rows(&self, table: &str, rows: Batch) {
        self.rows.lock().unwrap().insert(table.to_string(), rows);
    }

    pub fn stored_rows(&self, table: &str) -> Batch {
        self.rows
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn ddl_log(&self) -> Vec<String> {
        self.executed_ddl.lock().unwrap().clone()
    }

    fn find_table(&self, name: &str) -> Result<TableInfo> {
        self.tables
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| BridgeError::Introspection(format!("no such table: {}", name)))
    }
}

#[async_trait]
impl Introspector for MockEngine {
    fn dialect(&self) -> Dialect {
        self.dialect.unwrap_or(Dialect::Sqlite)
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(BridgeError::Introspection("mock discovery failure".into()));
        }
        Ok(self
            .tables
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect())
    }

    async fn list_views(&self) -> Result<Vec<String>> {
        Ok(self
            .views
            .lock()
            .unwrap()
            .iter()
            .map(|v| v.name.clone())
            .collect())
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        if self.fail_columns.lock().unwrap().contains(table) {
            return Err(BridgeError::Introspection(format!(
                "mock column failure: {}",
                table
            )));
        }
        Ok(self.find_table(table)?.columns)
    }

    async fn get_indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        if self.fail_indexes.lock().unwrap().contains(table) {
            return Err(BridgeError::Introspection(format!(
                "mock index failure: {}",
                table
            )));
        }
        Ok(self.find_table(table)?.indexes)
    }

    async fn get_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        if self.fail_foreign_keys.lock().unwrap().contains(table) {
            return Err(BridgeError::Introspection(format!(
                "mock foreign key failure: {}",
                table
            )));
        }
        Ok(self.find_table(table)?.foreign_keys)
    }

    async fn get_row_count(&self, table: &str) -> Result<i64> {
        if let Some(rows) = self.rows.lock().unwrap().get(table) {
            return Ok(rows.len() as i64);
        }
        Ok(self.find_table(table).map(|t| t.row_count).unwrap_or(0))
    }

    async fn get_view_definition(&self, view: &str) -> Result<String> {
        self.views
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.name == view)
            .map(|v| v.definition.clone())
            .ok_or_else(|| BridgeError::Introspection(format!("no such view: {}", view)))
    }
}

#[async_trait]
impl SourceReader for MockEngine {
    async fn read_batch(&self, table: &TableInfo, offset: i64, limit: usize) -> Result<Batch> {
        let rows = self.stored_rows(&table.name);
        let start = (offset.max(0) as usize).min(rows.len());
        let end = (start + limit).min(rows.len());
        Ok(rows[start..end].to_vec())
    }
}

#[async_trait]
impl TargetWriter for MockEngine {
    async fn execute_ddl(&self, sql: &str) -> Result<()> {
        self.executed_ddl.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(table)))
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.executed_ddl
            .lock()
            .unwrap()
            .push(format!("DROP TABLE {}", table));
        self.tables
            .lock()
            .unwrap()
            .retain(|t| !t.name.eq_ignore_ascii_case(table));
        Ok(())
    }

    async fn write_batch(&self, table: &TableInfo, rows: &Batch) -> Result<u64> {
        if self.fail_writes.lock().unwrap().contains(&table.name) {
            return Err(BridgeError::transfer(&table.name, "mock write failure"));
        }
        if self.swallow_writes.load(Ordering::SeqCst) {
            return Ok(rows.len() as u64);
        }
        self.rows
            .lock()
            .unwrap()
            .entry(table.name.clone())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }

    async fn reset_auto_increment(&self, _table: &TableInfo) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl DatabaseEngine for MockEngine {
    async fn close(&self) {}
}

/// A nullable column of the given type.
pub(crate) fn column(name: &str, data_type: &str) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        data_type: data_type.to_string(),
        is_nullable: true,
        default_value: None,
        is_primary_key: false,
        is_auto_increment: false,
        max_length: 0,
        precision: 0,
        scale: 0,
        ordinal_pos: 1,
    }
}

/// A non-null primary key column.
pub(crate) fn pk_column(name: &str, data_type: &str) -> ColumnInfo {
    ColumnInfo {
        is_nullable: false,
        is_primary_key: true,
        ..column(name, data_type)
    }
}

pub(crate) fn table(name: &str, columns: Vec<ColumnInfo>) -> TableInfo {
    let primary_key = columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| c.name.clone())
        .collect();
    TableInfo {
        name: name.to_string(),
        schema: None,
        columns,
        primary_key,
        indexes: vec![],
        foreign_keys: vec![],
        row_count: 0,
    }
}
