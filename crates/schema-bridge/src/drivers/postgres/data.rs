//! PostgreSQL data movement: typed batch reads and parameterized
//! batch writes.

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::Row;
use tracing::debug;
use uuid::Uuid;

use crate::core::identifier::quote_pg;
use crate::core::schema::TableInfo;
use crate::core::traits::{SourceReader, TargetWriter};
use crate::core::value::{Batch, SqlValue};
use crate::dialect::canonical::coerce_value;
use crate::dialect::{canonicalize, CanonicalType, Dialect};
use crate::error::{BridgeError, Result};

use super::PostgresEngine;

/// Keep well under the wire protocol's 65535 bind-parameter limit.
const MAX_PARAMS_PER_STATEMENT: usize = 20_000;

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Null(_) => Ok(IsNull::Yes),
            SqlValue::Bool(v) => v.to_sql(ty, out),
            SqlValue::I16(v) => v.to_sql(ty, out),
            SqlValue::I32(v) => v.to_sql(ty, out),
            SqlValue::I64(v) => v.to_sql(ty, out),
            SqlValue::F32(v) => v.to_sql(ty, out),
            SqlValue::F64(v) => v.to_sql(ty, out),
            SqlValue::Text(v) => v.to_sql(ty, out),
            SqlValue::Bytes(v) => v.to_sql(ty, out),
            SqlValue::Uuid(v) => v.to_sql(ty, out),
            SqlValue::Decimal(v) => v.to_sql(ty, out),
            SqlValue::Date(v) => v.to_sql(ty, out),
            SqlValue::Time(v) => v.to_sql(ty, out),
            SqlValue::DateTime(v) => v.to_sql(ty, out),
            SqlValue::DateTimeTz(v) => v.to_sql(ty, out),
            SqlValue::Json(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Values are coerced to the column's canonical type before
        // binding; the per-variant to_sql does the final check.
        true
    }

    to_sql_checked!();
}

fn decode_column(row: &Row, idx: usize, canonical: &CanonicalType, name: &str) -> Result<SqlValue> {
    let hint = canonical.null_hint();
    let fail = |e: tokio_postgres::Error| {
        BridgeError::conversion(name, format!("decode failed: {}", e))
    };

    let value = match canonical {
        CanonicalType::Boolean => row
            .try_get::<_, Option<bool>>(idx)
            .map_err(fail)?
            .map(SqlValue::Bool),
        CanonicalType::Int16 => row
            .try_get::<_, Option<i16>>(idx)
            .map_err(fail)?
            .map(SqlValue::I16),
        CanonicalType::Int32 => row
            .try_get::<_, Option<i32>>(idx)
            .map_err(fail)?
            .map(SqlValue::I32),
        CanonicalType::Int64 => row
            .try_get::<_, Option<i64>>(idx)
            .map_err(fail)?
            .map(SqlValue::I64),
        CanonicalType::Float32 => row
            .try_get::<_, Option<f32>>(idx)
            .map_err(fail)?
            .map(SqlValue::F32),
        CanonicalType::Float64 => row
            .try_get::<_, Option<f64>>(idx)
            .map_err(fail)?
            .map(SqlValue::F64),
        CanonicalType::Decimal { .. } => row
            .try_get::<_, Option<Decimal>>(idx)
            .map_err(fail)?
            .map(SqlValue::Decimal),
        CanonicalType::Char(_)
        | CanonicalType::Varchar(_)
        | CanonicalType::Text
        | CanonicalType::Unknown(_) => row
            .try_get::<_, Option<String>>(idx)
            .map_err(fail)?
            .map(SqlValue::Text),
        CanonicalType::Blob => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .map_err(fail)?
            .map(SqlValue::Bytes),
        CanonicalType::Date => row
            .try_get::<_, Option<NaiveDate>>(idx)
            .map_err(fail)?
            .map(SqlValue::Date),
        CanonicalType::Time => row
            .try_get::<_, Option<NaiveTime>>(idx)
            .map_err(fail)?
            .map(SqlValue::Time),
        CanonicalType::DateTime => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map_err(fail)?
            .map(SqlValue::DateTime),
        CanonicalType::DateTimeTz => row
            .try_get::<_, Option<DateTime<FixedOffset>>>(idx)
            .map_err(fail)?
            .map(SqlValue::DateTimeTz),
        CanonicalType::Uuid => row
            .try_get::<_, Option<Uuid>>(idx)
            .map_err(fail)?
            .map(SqlValue::Uuid),
        CanonicalType::Json => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .map_err(fail)?
            .map(SqlValue::Json),
    };

    Ok(value.unwrap_or(SqlValue::Null(hint)))
}

impl PostgresEngine {
    /// Deterministic ORDER BY so disjoint offset ranges partition the
    /// table: primary key when there is one, first column otherwise.
    fn order_clause(table: &TableInfo) -> Result<String> {
        let cols: Vec<&str> = if table.primary_key.is_empty() {
            table.columns.first().map(|c| c.name.as_str()).into_iter().collect()
        } else {
            table.primary_key.iter().map(String::as_str).collect()
        };
        if cols.is_empty() {
            return Ok(String::new());
        }
        let quoted: Vec<String> = cols.iter().map(|c| quote_pg(c)).collect::<Result<_>>()?;
        Ok(format!(" ORDER BY {}", quoted.join(", ")))
    }
}

#[async_trait]
impl SourceReader for PostgresEngine {
    async fn read_batch(&self, table: &TableInfo, offset: i64, limit: usize) -> Result<Batch> {
        let client = self.client().await?;

        let canonicals: Vec<CanonicalType> = table
            .columns
            .iter()
            .map(|c| canonicalize(&c.data_type, Dialect::Postgres).canonical_type)
            .collect();

        // Unknown types are read through a text cast so exotic columns
        // transfer as their text form instead of failing the batch.
        let select_list: Vec<String> = table
            .columns
            .iter()
            .zip(&canonicals)
            .map(|(c, canonical)| {
                let quoted = quote_pg(&c.name)?;
                Ok(match canonical {
                    CanonicalType::Unknown(_) => format!("{}::text", quoted),
                    _ => quoted,
                })
            })
            .collect::<Result<_>>()?;

        let sql = format!(
            "SELECT {} FROM {}{} LIMIT {} OFFSET {}",
            select_list.join(", "),
            self.qualified(&table.name)?,
            Self::order_clause(table)?,
            limit,
            offset,
        );

        let rows = client.query(sql.as_str(), &[]).await?;

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
impl TargetWriter for PostgresEngine {
    async fn execute_ddl(&self, sql: &str) -> Result<()> {
        let client = self.client().await?;
        client.batch_execute(sql).await?;
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_name = $2)",
                &[&self.schema, &table],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let sql = format!("DROP TABLE IF EXISTS {} CASCADE", self.qualified(table)?);
        self.execute_ddl(&sql).await
    }

    async fn write_batch(&self, table: &TableInfo, rows: &Batch) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let client = self.client().await?;
        let qualified = self.qualified(&table.name)?;

        let canonicals: Vec<CanonicalType> = table
            .columns
            .iter()
            .map(|c| canonicalize(&c.data_type, Dialect::Postgres).canonical_type)
            .collect();

        let col_list: Vec<String> = table
            .columns
            .iter()
            .map(|c| quote_pg(&c.name))
            .collect::<Result<_>>()?;
        let cols_per_row = table.columns.len().max(1);
        let rows_per_stmt = (MAX_PARAMS_PER_STATEMENT / cols_per_row).max(1);

        let mut total = 0u64;

        for chunk in rows.chunks(rows_per_stmt) {
            let mut coerced: Vec<SqlValue> = Vec::with_capacity(chunk.len() * cols_per_row);
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
                for ((value, canonical), col) in
                    row.iter().zip(&canonicals).zip(&table.columns)
                {
                    coerced.push(coerce_value(&col.name, value.clone(), canonical)?);
                }
            }

            let mut value_groups = Vec::with_capacity(chunk.len());
            let mut param_idx = 1;
            for _ in chunk {
                let placeholders: Vec<String> = (0..cols_per_row)
                    .map(|_| {
                        let p = format!("${}", param_idx);
                        param_idx += 1;
                        p
                    })
                    .collect();
                value_groups.push(format!("({})", placeholders.join(", ")));
            }

            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                qualified,
                col_list.join(", "),
                value_groups.join(", ")
            );

            let params: Vec<&(dyn ToSql + Sync)> = coerced
                .iter()
                .map(|v| v as &(dyn ToSql + Sync))
                .collect();

            client
                .execute(sql.as_str(), &params)
                .await
                .map_err(|e| {
                    BridgeError::transfer(
                        &table.name,
                        format!("batched INSERT ({} rows): {}", chunk.len(), e),
                    )
                })?;

            total += chunk.len() as u64;
        }

        debug!("Wrote {} rows to {}", total, qualified);
        Ok(total)
    }

    async fn reset_auto_increment(&self, table: &TableInfo) -> Result<()> {
        let client = self.client().await?;

        for col in table.columns.iter().filter(|c| c.is_auto_increment) {
            let sql = format!(
                "SELECT setval(pg_get_serial_sequence('{}.{}', '{}'), \
                 COALESCE((SELECT MAX({}) FROM {}), 1))",
                self.schema.replace('\'', "''"),
                table.name.replace('\'', "''"),
                col.name.replace('\'', "''"),
                quote_pg(&col.name)?,
                self.qualified(&table.name)?,
            );
            client.batch_execute(sql.as_str()).await?;
        }

        Ok(())
    }
}
