//! SQLite catalog introspection via sqlite_master and PRAGMAs.

use async_trait::async_trait;
use sqlx::Row;
use tracing::debug;

use crate::core::identifier::quote_sqlite;
use crate::core::schema::{ColumnInfo, ForeignKeyInfo, IndexInfo};
use crate::core::traits::Introspector;
use crate::dialect::canonical::parse_type_params;
use crate::dialect::Dialect;
use crate::error::{BridgeError, Result};

use super::SqliteEngine;

/// Fill max_length or precision/scale from a declared type such as
/// `VARCHAR(70)` or `DECIMAL(10,2)`.
fn split_declared_type(declared: &str) -> (i32, i32, i32) {
    let (base, p1, p2) = parse_type_params(declared);
    match (p1, p2) {
        (Some(p), Some(s)) => (0, p as i32, s as i32),
        (Some(n), None) => {
            if base.contains("char") || base.contains("text") || base.contains("binary") {
                (n as i32, 0, 0)
            } else {
                (0, n as i32, 0)
            }
        }
        _ => (0, 0, 0),
    }
}

#[async_trait]
impl Introspector for SqliteEngine {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|r| r.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }

    async fn list_views(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'view' ORDER BY name",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|r| r.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let sql = format!("PRAGMA table_info({})", quote_sqlite(table)?);
        let rows = sqlx::query(sql.as_str()).fetch_all(self.pool()).await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let cid: i64 = row.try_get("cid")?;
            let name: String = row.try_get("name")?;
            let declared: String = row.try_get("type")?;
            let notnull: i64 = row.try_get("notnull")?;
            let default_value: Option<String> = row.try_get("dflt_value")?;
            let pk: i64 = row.try_get("pk")?;

            let (max_length, precision, scale) = split_declared_type(&declared);

            columns.push(ColumnInfo {
                name,
                data_type: declared,
                is_nullable: notnull == 0,
                default_value,
                is_primary_key: pk > 0,
                is_auto_increment: false,
                max_length,
                precision,
                scale,
                ordinal_pos: cid as i32 + 1,
            });
        }

        // A single INTEGER primary key is a rowid alias and therefore
        // auto-assigns values, with or without the AUTOINCREMENT
        // keyword.
        let pk_cols: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_primary_key)
            .map(|(i, _)| i)
            .collect();
        if pk_cols.len() == 1 {
            let only = pk_cols[0];
            if columns[only].data_type.to_lowercase().contains("int") {
                columns[only].is_auto_increment = true;
            }
        }

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn get_indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        let sql = format!("PRAGMA index_list({})", quote_sqlite(table)?);
        let rows = sqlx::query(sql.as_str()).fetch_all(self.pool()).await?;

        let mut indexes = Vec::new();
        for row in &rows {
            let name: String = row.try_get("name")?;
            let unique: i64 = row.try_get("unique")?;
            let origin: String = row.try_get("origin").unwrap_or_default();

            // Primary-key indexes are already represented by the
            // column metadata.
            if origin == "pk" {
                continue;
            }

            let info_sql = format!("PRAGMA index_info({})", quote_sqlite(&name)?);
            let info_rows = sqlx::query(info_sql.as_str()).fetch_all(self.pool()).await?;

            let mut index_columns = Vec::with_capacity(info_rows.len());
            for info in &info_rows {
                // Expression index members have a NULL column name.
                if let Some(col) = info.try_get::<Option<String>, _>("name")? {
                    index_columns.push(col);
                }
            }

            indexes.push(IndexInfo {
                name,
                columns: index_columns,
                is_unique: unique != 0,
            });
        }

        Ok(indexes)
    }

    async fn get_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let sql = format!("PRAGMA foreign_key_list({})", quote_sqlite(table)?);
        let rows = sqlx::query(sql.as_str()).fetch_all(self.pool()).await?;

        let mut fks = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.try_get("id")?;
            let seq: i64 = row.try_get("seq")?;
            let referenced_table: String = row.try_get("table")?;
            let column: String = row.try_get("from")?;
            // NULL when the constraint references the target's implicit
            // primary key; validation resolves or reports it.
            let referenced_column: Option<String> = row.try_get("to")?;
            let on_update: String = row.try_get("on_update")?;
            let on_delete: String = row.try_get("on_delete")?;

            let name = if seq == 0 {
                format!("fk_{}_{}", table, id)
            } else {
                format!("fk_{}_{}_{}", table, id, seq)
            };

            fks.push(ForeignKeyInfo {
                name,
                column,
                referenced_table,
                referenced_column: referenced_column.unwrap_or_default(),
                on_delete,
                on_update,
            });
        }

        Ok(fks)
    }

    async fn get_row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_sqlite(table)?);
        let count: i64 = sqlx::query_scalar(sql.as_str()).fetch_one(self.pool()).await?;
        Ok(count)
    }

    async fn get_view_definition(&self, view: &str) -> Result<String> {
        let row = sqlx::query(
            "SELECT sql FROM sqlite_master WHERE type = 'view' AND name = ?",
        )
        .bind(view)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(r) => Ok(r.try_get::<Option<String>, _>("sql")?.unwrap_or_default()),
            None => Err(BridgeError::Introspection(format!(
                "view not found: {}",
                view
            ))),
        }
    }
}
