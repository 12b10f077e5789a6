//! SQLite data movement.
//!
//! Reads decode through the column's canonical type; writes lean on
//! SQLite's type affinity, binding uuids, decimals, temporals, and
//! json as text.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::Row;
use tracing::debug;

use crate::core::identifier::quote_sqlite;
use crate::core::schema::TableInfo;
use crate::core::traits::{SourceReader, TargetWriter};
use crate::core::value::{Batch, SqlValue};
use crate::dialect::{canonicalize, CanonicalType, Dialect};
use crate::error::{BridgeError, Result};

use super::SqliteEngine;

/// Stay under SQLite's historical 999 bind-parameter ceiling.
const MAX_PARAMS_PER_STATEMENT: usize = 900;

fn decode_column(
    row: &SqliteRow,
    idx: usize,
    canonical: &CanonicalType,
    name: &str,
) -> Result<SqlValue> {
    let hint = canonical.null_hint();

    let value = match canonical {
        CanonicalType::Boolean => match row.try_get::<Option<bool>, _>(idx) {
            Ok(v) => v.map(SqlValue::Bool),
            // Stored as a plain integer on disk.
            Err(_) => row
                .try_get::<Option<i64>, _>(idx)
                .map_err(|e| BridgeError::conversion(name, e))?
                .map(|v| SqlValue::Bool(v != 0)),
        },
        CanonicalType::Int16 | CanonicalType::Int32 | CanonicalType::Int64 => row
            .try_get::<Option<i64>, _>(idx)
            .map_err(|e| BridgeError::conversion(name, e))?
            .map(SqlValue::I64),
        CanonicalType::Float32 | CanonicalType::Float64 => row
            .try_get::<Option<f64>, _>(idx)
            .map_err(|e| BridgeError::conversion(name, e))?
            .map(SqlValue::F64),
        CanonicalType::Decimal { .. } => decode_decimal(row, idx, name)?,
        CanonicalType::Blob => row
            .try_get::<Option<Vec<u8>>, _>(idx)
            .map_err(|e| BridgeError::conversion(name, e))?
            .map(SqlValue::Bytes),
        // Everything else is read in its text form; the write-side
        // coercion parses it into the target column's shape.
        _ => row
            .try_get::<Option<String>, _>(idx)
            .map_err(|e| BridgeError::conversion(name, e))?
            .map(SqlValue::Text),
    };

    Ok(value.unwrap_or(SqlValue::Null(hint)))
}

/// DECIMAL columns may hold TEXT (exact) or REAL/INTEGER storage.
fn decode_decimal(row: &SqliteRow, idx: usize, name: &str) -> Result<Option<SqlValue>> {
    if let Ok(Some(text)) = row.try_get::<Option<String>, _>(idx) {
        if let Ok(d) = text.parse::<Decimal>() {
            return Ok(Some(SqlValue::Decimal(d)));
        }
    }
    match row.try_get::<Option<f64>, _>(idx) {
        Ok(Some(v)) => Decimal::from_f64_retain(v)
            .map(|d| Some(SqlValue::Decimal(d)))
            .ok_or_else(|| BridgeError::conversion(name, "non-finite float")),
        Ok(None) => Ok(None),
        Err(e) => Err(BridgeError::conversion(name, e)),
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null(_) => query.bind(Option::<String>::None),
        SqlValue::Bool(v) => query.bind(v),
        SqlValue::I16(v) => query.bind(i64::from(v)),
        SqlValue::I32(v) => query.bind(i64::from(v)),
        SqlValue::I64(v) => query.bind(v),
        SqlValue::F32(v) => query.bind(f64::from(v)),
        SqlValue::F64(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
        SqlValue::Bytes(v) => query.bind(v),
        other => query.bind(other.as_text()),
    }
}

impl SqliteEngine {
    fn order_clause(table: &TableInfo) -> Result<String> {
        let cols: Vec<&str> = if table.primary_key.is_empty() {
            table
                .columns
                .first()
                .map(|c| c.name.as_str())
                .into_iter()
                .collect()
        } else {
            table.primary_key.iter().map(String::as_str).collect()
        };
        if cols.is_empty() {
            return Ok(String::new());
        }
        let quoted: Vec<String> = cols.iter().map(|c| quote_sqlite(c)).collect::<Result<_>>()?;
        Ok(format!(" ORDER BY {}", quoted.join(", ")))
    }
}

#[async_trait]
impl SourceReader for SqliteEngine {
    async fn read_batch(&self, table: &TableInfo, offset: i64, limit: usize) -> Result<Batch> {
        let canonicals: Vec<CanonicalType> = table
            .columns
            .iter()
            .map(|c| canonicalize(&c.data_type, Dialect::Sqlite).canonical_type)
            .collect();

        let select_list: Vec<String> = table
            .columns
            .iter()
            .map(|c| quote_sqlite(&c.name))
            .collect::<Result<_>>()?;

        let sql = format!(
            "SELECT {} FROM {}{} LIMIT {} OFFSET {}",
            select_list.join(", "),
            quote_sqlite(&table.name)?,
            Self::order_clause(table)?,
            limit,
            offset,
        );

        let rows = sqlx::query(sql.as_str()).fetch_all(self.pool()).await?;

        let mut batch = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(table.columns.len());
            for (idx, (col, canonical)) in table.columns.iter().zip(&canonicals).enumerate() {
                values.push(decode_column(row, idx, canonical, &col.name)?);
            }
            batch.push(values);
        }

        Ok(batch)
    }
}

#[async_trait]
impl TargetWriter for SqliteEngine {
    async fn execute_ddl(&self, sql: &str) -> Result<()> {
        sqlx::raw_sql(sql).execute(self.pool()).await?;
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(self.pool())
        .await?;
        Ok(count > 0)
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let sql = format!("DROP TABLE IF EXISTS {}", quote_sqlite(table)?);
        self.execute_ddl(&sql).await
    }

    async fn write_batch(&self, table: &TableInfo, rows: &Batch) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let col_list: Vec<String> = table
            .columns
            .iter()
            .map(|c| quote_sqlite(&c.name))
            .collect::<Result<_>>()?;
        let cols_per_row = table.columns.len().max(1);
        let rows_per_stmt = (MAX_PARAMS_PER_STATEMENT / cols_per_row).max(1);

        let qualified = quote_sqlite(&table.name)?;
        let mut total = 0u64;

        for chunk in rows.chunks(rows_per_stmt) {
            let placeholders = format!(
                "({})",
                std::iter::repeat("?")
                    .take(cols_per_row)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            let value_groups: Vec<&str> =
                std::iter::repeat(placeholders.as_str()).take(chunk.len()).collect();

            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                qualified,
                col_list.join(", "),
                value_groups.join(", ")
            );

            let mut query = sqlx::query(sql.as_str());
            for row in chunk {
                if row.len() != table.columns.len() {
                    return Err(BridgeError::transfer(
                        &table.name,
                        format!(
                            "row has {} values but table has {} columns",
                            row.len(),
                            table.columns.len()
                        ),
                    ));
                }
                for value in row {
                    query = bind_value(query, value.clone());
                }
            }

            query.execute(self.pool()).await.map_err(|e| {
                BridgeError::transfer(
                    &table.name,
                    format!("batched INSERT ({} rows): {}", chunk.len(), e),
                )
            })?;

            total += chunk.len() as u64;
        }

        debug!("Wrote {} rows to {}", total, table.name);
        Ok(total)
    }

    async fn reset_auto_increment(&self, table: &TableInfo) -> Result<()> {
        // Rowid-alias keys continue from MAX(rowid) automatically, and
        // AUTOINCREMENT tables update sqlite_sequence on every insert.
        debug!("No sequence reset needed for {}", table.name);
        Ok(())
    }
}
