//! PostgreSQL catalog introspection.

use async_trait::async_trait;
use tracing::debug;

use crate::core::schema::{ColumnInfo, ForeignKeyInfo, IndexInfo};
use crate::core::traits::Introspector;
use crate::dialect::Dialect;
use crate::error::{BridgeError, Result};

use super::PostgresEngine;

#[async_trait]
impl Introspector for PostgresEngine {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
                &[&self.schema],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    async fn list_views(&self) -> Result<Vec<String>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_type = 'VIEW' \
                 ORDER BY table_name",
                &[&self.schema],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let client = self.client().await?;

        let query = r#"
            SELECT
                column_name,
                udt_name,
                COALESCE(character_maximum_length, 0)::int4,
                COALESCE(numeric_precision, 0)::int4,
                COALESCE(numeric_scale, 0)::int4,
                CASE WHEN is_nullable = 'YES' THEN true ELSE false END,
                column_default,
                COALESCE(
                    (SELECT true FROM pg_catalog.pg_class c
                     JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid
                     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
                     WHERE n.nspname = columns.table_schema
                       AND c.relname = columns.table_name
                       AND a.attname = columns.column_name
                       AND a.attidentity IN ('a', 'd')),
                    false
                ) AS is_identity,
                ordinal_position::int4
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = client.query(query, &[&self.schema, &table]).await?;

        let mut columns: Vec<ColumnInfo> = rows
            .iter()
            .map(|row| {
                let default_value: Option<String> = row.get(6);
                let is_identity: bool = row.get(7);
                // Sequence-backed serial columns show up as a nextval()
                // default rather than an identity attribute.
                let is_auto_increment = is_identity
                    || default_value
                        .as_deref()
                        .map(|d| d.starts_with("nextval("))
                        .unwrap_or(false);

                ColumnInfo {
                    name: row.get(0),
                    data_type: row.get(1),
                    max_length: row.get(2),
                    precision: row.get(3),
                    scale: row.get(4),
                    is_nullable: row.get(5),
                    default_value,
                    is_primary_key: false,
                    is_auto_increment,
                    ordinal_pos: row.get(8),
                }
            })
            .collect();

        // Mark primary key membership in key order.
        let pk_query = r#"
            SELECT a.attname
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'p'
              AND a.attnum = ANY(c.conkey)
            ORDER BY array_position(c.conkey, a.attnum)
        "#;
        let pk_rows = client.query(pk_query, &[&self.schema, &table]).await?;
        for pk_row in pk_rows {
            let name: String = pk_row.get(0);
            if let Some(col) = columns.iter_mut().find(|c| c.name == name) {
                col.is_primary_key = true;
            }
        }

        debug!("Loaded {} columns for {}.{}", columns.len(), self.schema, table);
        Ok(columns)
    }

    async fn get_indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        let client = self.client().await?;

        let query = r#"
            SELECT i.relname, ix.indisunique, a.attname
            FROM pg_catalog.pg_class t
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_index ix ON ix.indrelid = t.oid
            JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
            JOIN pg_catalog.pg_attribute a
              ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE n.nspname = $1
              AND t.relname = $2
              AND NOT ix.indisprimary
            ORDER BY i.relname, array_position(ix.indkey, a.attnum)
        "#;

        let rows = client.query(query, &[&self.schema, &table]).await?;

        let mut indexes: Vec<IndexInfo> = Vec::new();
        for row in rows {
            let name: String = row.get(0);
            let is_unique: bool = row.get(1);
            let column: String = row.get(2);

            match indexes.iter_mut().find(|i| i.name == name) {
                Some(idx) => idx.columns.push(column),
                None => indexes.push(IndexInfo {
                    name,
                    columns: vec![column],
                    is_unique,
                }),
            }
        }

        Ok(indexes)
    }

    async fn get_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let client = self.client().await?;

        let query = r#"
            SELECT
                tc.constraint_name,
                kcu.column_name,
                ccu.table_name,
                ccu.column_name,
                rc.delete_rule,
                rc.update_rule
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON kcu.constraint_name = tc.constraint_name
             AND kcu.constraint_schema = tc.constraint_schema
            JOIN information_schema.constraint_column_usage ccu
              ON ccu.constraint_name = tc.constraint_name
             AND ccu.constraint_schema = tc.constraint_schema
            JOIN information_schema.referential_constraints rc
              ON rc.constraint_name = tc.constraint_name
             AND rc.constraint_schema = tc.constraint_schema
            WHERE tc.table_schema = $1
              AND tc.table_name = $2
              AND tc.constraint_type = 'FOREIGN KEY'
            ORDER BY tc.constraint_name
        "#;

        let rows = client.query(query, &[&self.schema, &table]).await?;

        Ok(rows
            .iter()
            .map(|row| ForeignKeyInfo {
                name: row.get(0),
                column: row.get(1),
                referenced_table: row.get(2),
                referenced_column: row.get(3),
                on_delete: row.get(4),
                on_update: row.get(5),
            })
            .collect())
    }

    async fn get_row_count(&self, table: &str) -> Result<i64> {
        let client = self.client().await?;
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualified(table)?);
        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(row.get(0))
    }

    async fn get_view_definition(&self, view: &str) -> Result<String> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT COALESCE(view_definition, '') \
                 FROM information_schema.views \
                 WHERE table_schema = $1 AND table_name = $2",
                &[&self.schema, &view],
            )
            .await?;

        rows.first()
            .map(|r| r.get(0))
            .ok_or_else(|| BridgeError::Introspection(format!("view not found: {}", view)))
    }
}
