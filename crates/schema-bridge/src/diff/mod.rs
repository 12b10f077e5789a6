//! Structural schema diffing and reconciliation SQL generation.
//!
//! [`diff_schemas`] compares two snapshots of the *same* database for
//! drift detection. [`compare_schemas`] compares snapshots from two
//! possibly different dialects: column types are canonicalized first so
//! that equivalent types spelled differently per dialect are not
//! reported as differences, and the result carries the SQL needed to
//! reconcile the target to the source.

use serde_json::json;

use crate::core::schema::{
    ColumnInfo, ForeignKeyInfo, IndexInfo, SchemaChange, SchemaChangeKind, SchemaInfo, TableInfo,
};
use crate::dialect::canonical::to_canonical;
use crate::dialect::typemap::normalize_column;
use crate::dialect::Dialect;
use crate::error::Result;

/// Compute the structural diff between two snapshots of one database.
pub fn diff_schemas(old: &SchemaInfo, new: &SchemaInfo) -> Vec<SchemaChange> {
    let mut changes = Vec::new();

    let mut old_names: Vec<&TableInfo> = old.tables.iter().collect();
    let mut new_names: Vec<&TableInfo> = new.tables.iter().collect();
    old_names.sort_by(|a, b| a.name.cmp(&b.name));
    new_names.sort_by(|a, b| a.name.cmp(&b.name));

    for table in &new_names {
        if old.table(&table.name).is_none() {
            changes.push(
                SchemaChange::table_level(SchemaChangeKind::TableAdded, &table.name)
                    .with_detail(json!({ "columns": table.columns.len() })),
            );
        }
    }

    for table in &old_names {
        if new.table(&table.name).is_none() {
            changes.push(
                SchemaChange::table_level(SchemaChangeKind::TableRemoved, &table.name)
                    .with_detail(json!({ "columns": table.columns.len() })),
            );
        }
    }

    for new_table in &new_names {
        let Some(old_table) = old.table(&new_table.name) else {
            continue;
        };
        changes.extend(diff_columns(old_table, new_table));
    }

    changes
}

fn diff_columns(old: &TableInfo, new: &TableInfo) -> Vec<SchemaChange> {
    let mut changes = Vec::new();

    for col in &new.columns {
        if old.column(&col.name).is_none() {
            changes.push(SchemaChange {
                kind: SchemaChangeKind::ColumnAdded,
                table: new.name.clone(),
                column: Some(col.name.clone()),
                detail: column_detail(col),
            });
        }
    }

    for col in &old.columns {
        if new.column(&col.name).is_none() {
            changes.push(SchemaChange {
                kind: SchemaChangeKind::ColumnRemoved,
                table: new.name.clone(),
                column: Some(col.name.clone()),
                detail: column_detail(col),
            });
        }
    }

    for new_col in &new.columns {
        let Some(old_col) = old.column(&new_col.name) else {
            continue;
        };
        if old_col.signature() != new_col.signature() {
            changes.push(SchemaChange {
                kind: SchemaChangeKind::ColumnModified,
                table: new.name.clone(),
                column: Some(new_col.name.clone()),
                detail: json!({
                    "old": column_detail(old_col),
                    "new": column_detail(new_col),
                }),
            });
        }
    }

    changes
}

fn column_detail(col: &ColumnInfo) -> serde_json::Value {
    json!({
        "type": col.data_type,
        "nullable": col.is_nullable,
        "primary_key": col.is_primary_key,
        "default": col.default_value,
    })
}

/// Result of a cross-dialect schema comparison.
#[derive(Debug, Clone)]
pub struct SchemaComparisonResult {
    /// True when no structural differences were found.
    pub compatible: bool,

    /// The differences, in [`diff_schemas`] terms (target-relative:
    /// `TableAdded` means the source has a table the target lacks).
    pub differences: Vec<SchemaChange>,

    /// SQL statements, in target dialect, sufficient to reconcile the
    /// target to the source.
    pub sql_statements: Vec<String>,

    /// Lossy type-mapping warnings gathered while generating SQL.
    pub warnings: Vec<String>,
}

/// Compare a source schema against a target schema across dialects.
pub fn compare_schemas(
    source: &SchemaInfo,
    target: &SchemaInfo,
    source_dialect: Dialect,
    target_dialect: Dialect,
) -> Result<SchemaComparisonResult> {
    let mut differences = Vec::new();
    let mut sql_statements = Vec::new();
    let mut warnings = Vec::new();

    let mut source_tables: Vec<&TableInfo> = source.tables.iter().collect();
    source_tables.sort_by(|a, b| a.name.cmp(&b.name));

    for table in &source_tables {
        let Some(target_table) = target.table(&table.name) else {
            differences.push(
                SchemaChange::table_level(SchemaChangeKind::TableAdded, &table.name)
                    .with_detail(json!({ "columns": table.columns.len() })),
            );
            sql_statements.push(generate_create_table(
                table,
                source_dialect,
                target_dialect,
                &mut warnings,
            )?);
            for index in &table.indexes {
                sql_statements.push(generate_create_index(&table.name, index, target_dialect)?);
            }
            continue;
        };

        for col in &table.columns {
            match target_table.column(&col.name) {
                None => {
                    differences.push(SchemaChange {
                        kind: SchemaChangeKind::ColumnAdded,
                        table: table.name.clone(),
                        column: Some(col.name.clone()),
                        detail: column_detail(col),
                    });
                    sql_statements.push(generate_add_column(
                        &table.name,
                        col,
                        source_dialect,
                        target_dialect,
                        &mut warnings,
                    )?);
                }
                Some(target_col) => {
                    if !columns_equivalent(col, target_col, source_dialect, target_dialect) {
                        differences.push(SchemaChange {
                            kind: SchemaChangeKind::ColumnModified,
                            table: table.name.clone(),
                            column: Some(col.name.clone()),
                            detail: json!({
                                "old": column_detail(target_col),
                                "new": column_detail(col),
                            }),
                        });
                    }
                }
            }
        }

        for target_col in &target_table.columns {
            if table.column(&target_col.name).is_none() {
                differences.push(SchemaChange {
                    kind: SchemaChangeKind::ColumnRemoved,
                    table: table.name.clone(),
                    column: Some(target_col.name.clone()),
                    detail: column_detail(target_col),
                });
            }
        }
    }

    for table in &target.tables {
        if source.table(&table.name).is_none() {
            differences.push(
                SchemaChange::table_level(SchemaChangeKind::TableRemoved, &table.name)
                    .with_detail(json!({ "columns": table.columns.len() })),
            );
        }
    }

    Ok(SchemaComparisonResult {
        compatible: differences.is_empty(),
        differences,
        sql_statements,
        warnings,
    })
}

/// Columns are equivalent when their canonical types match and the
/// nullable/primary-key flags agree.
fn columns_equivalent(
    source: &ColumnInfo,
    target: &ColumnInfo,
    source_dialect: Dialect,
    target_dialect: Dialect,
) -> bool {
    let canonical = |col: &ColumnInfo, dialect| {
        to_canonical(dialect, &col.data_type, col.max_length, col.precision, col.scale)
            .canonical_type
    };
    canonical(source, source_dialect) == canonical(target, target_dialect)
        && source.is_nullable == target.is_nullable
        && source.is_primary_key == target.is_primary_key
}

/// Generate a CREATE TABLE statement in the target dialect.
pub fn generate_create_table(
    table: &TableInfo,
    source_dialect: Dialect,
    target_dialect: Dialect,
    warnings: &mut Vec<String>,
) -> Result<String> {
    let caps = target_dialect.capabilities();
    let single_pk_auto = table.primary_key.len() == 1
        && table
            .column(&table.primary_key[0])
            .map(|c| c.is_auto_increment)
            .unwrap_or(false);

    let mut lines = Vec::with_capacity(table.columns.len() + 2);

    for col in &table.columns {
        lines.push(render_column(
            table,
            col,
            source_dialect,
            target_dialect,
            single_pk_auto,
            warnings,
        )?);
    }

    // With a SQLite rowid-alias key the PRIMARY KEY clause is already
    // on the column.
    let inline_pk = single_pk_auto && target_dialect == Dialect::Sqlite;
    if table.has_pk() && !inline_pk {
        let cols: Vec<String> = table
            .primary_key
            .iter()
            .map(|c| target_dialect.quote_ident(c))
            .collect::<Result<_>>()?;
        lines.push(format!("  PRIMARY KEY ({})", cols.join(", ")));
    }

    // Dialects without ALTER TABLE ADD CONSTRAINT get their foreign
    // keys inline; the rest add them after data load.
    if !caps.supports_add_constraint {
        for fk in &table.foreign_keys {
            lines.push(format!("  {}", render_inline_fk(fk, target_dialect)?));
        }
    }

    Ok(format!(
        "CREATE TABLE {} (\n{}\n)",
        target_dialect.quote_ident(&table.name)?,
        lines.join(",\n")
    ))
}

fn render_column(
    table: &TableInfo,
    col: &ColumnInfo,
    source_dialect: Dialect,
    target_dialect: Dialect,
    single_pk_auto: bool,
    warnings: &mut Vec<String>,
) -> Result<String> {
    let quoted = target_dialect.quote_ident(&col.name)?;
    let is_the_pk = single_pk_auto && table.is_pk_column(&col.name);

    // Rowid alias / identity column special cases.
    if is_the_pk && target_dialect == Dialect::Sqlite {
        return Ok(format!("  {} INTEGER PRIMARY KEY", quoted));
    }

    let mapping = normalize_column(col, source_dialect, target_dialect);
    if let Some(w) = &mapping.warning {
        warnings.push(format!("{}.{}: {}", table.name, col.name, w));
    }

    let mut line = format!("  {} {}", quoted, mapping.target_type);

    if is_the_pk && target_dialect == Dialect::Postgres {
        line.push_str(" GENERATED BY DEFAULT AS IDENTITY");
    }

    if !col.is_nullable {
        line.push_str(" NOT NULL");
    }

    if !col.is_auto_increment {
        if let Some(default) = col.default_value.as_deref().and_then(portable_default) {
            line.push_str(&format!(" DEFAULT {}", default));
        }
    }

    Ok(line)
}

/// Keep only defaults that mean the same thing on both engines:
/// literals and the CURRENT_* keywords. Engine-specific expressions
/// (nextval, casts with unknown functions) are dropped.
fn portable_default(raw: &str) -> Option<String> {
    // PostgreSQL reports defaults with cast suffixes: 'x'::text
    let trimmed = raw.trim();
    let trimmed = trimmed.split("::").next().unwrap_or(trimmed).trim();

    let upper = trimmed.to_uppercase();
    if matches!(
        upper.as_str(),
        "NULL" | "TRUE" | "FALSE" | "CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME"
    ) {
        return Some(upper);
    }
    if trimmed.parse::<f64>().is_ok() {
        return Some(trimmed.to_string());
    }
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        return Some(trimmed.to_string());
    }
    None
}

fn render_inline_fk(fk: &ForeignKeyInfo, dialect: Dialect) -> Result<String> {
    let mut clause = format!(
        "FOREIGN KEY ({}) REFERENCES {}",
        dialect.quote_ident(&fk.column)?,
        dialect.quote_ident(&fk.referenced_table)?,
    );
    if !fk.referenced_column.is_empty() {
        clause.push_str(&format!(" ({})", dialect.quote_ident(&fk.referenced_column)?));
    }
    if !fk.on_delete.is_empty() && fk.on_delete != "NO ACTION" {
        clause.push_str(&format!(" ON DELETE {}", fk.on_delete));
    }
    if !fk.on_update.is_empty() && fk.on_update != "NO ACTION" {
        clause.push_str(&format!(" ON UPDATE {}", fk.on_update));
    }
    Ok(clause)
}

/// Generate an ALTER TABLE ... ADD COLUMN statement.
pub fn generate_add_column(
    table: &str,
    col: &ColumnInfo,
    source_dialect: Dialect,
    target_dialect: Dialect,
    warnings: &mut Vec<String>,
) -> Result<String> {
    let mapping = normalize_column(col, source_dialect, target_dialect);
    if let Some(w) = &mapping.warning {
        warnings.push(format!("{}.{}: {}", table, col.name, w));
    }

    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        target_dialect.quote_ident(table)?,
        target_dialect.quote_ident(&col.name)?,
        mapping.target_type,
    );

    // Adding a NOT NULL column to a populated table needs a default.
    let default = col.default_value.as_deref().and_then(portable_default);
    if !col.is_nullable && default.is_some() {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = default {
        sql.push_str(&format!(" DEFAULT {}", default));
    }

    Ok(sql)
}

/// Generate a CREATE INDEX statement.
pub fn generate_create_index(table: &str, index: &IndexInfo, dialect: Dialect) -> Result<String> {
    let cols: Vec<String> = index
        .columns
        .iter()
        .map(|c| dialect.quote_ident(c))
        .collect::<Result<_>>()?;

    Ok(format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        if index.is_unique { "UNIQUE " } else { "" },
        dialect.quote_ident(&index.name)?,
        dialect.quote_ident(table)?,
        cols.join(", ")
    ))
}

/// Generate an ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY
/// statement. Only valid on dialects with `supports_add_constraint`.
pub fn generate_add_foreign_key(
    table: &str,
    fk: &ForeignKeyInfo,
    dialect: Dialect,
) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} {}",
        dialect.quote_ident(table)?,
        dialect.quote_ident(&fk.name)?,
        render_inline_fk(fk, dialect)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_column(name: &str, data_type: &str) -> ColumnInfo {
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

    fn make_table(name: &str, columns: Vec<ColumnInfo>) -> TableInfo {
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

    fn schema_of(tables: Vec<TableInfo>) -> SchemaInfo {
        SchemaInfo {
            tables,
            relationships: vec![],
            views: vec![],
        }
    }

    #[test]
    fn test_column_added_and_removed() {
        let s1 = schema_of(vec![make_table(
            "t",
            vec![make_column("id", "INTEGER"), make_column("a", "TEXT")],
        )]);
        let s2 = schema_of(vec![make_table(
            "t",
            vec![
                make_column("id", "INTEGER"),
                make_column("a", "TEXT"),
                make_column("b", "TEXT"),
            ],
        )]);

        let forward = diff_schemas(&s1, &s2);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].kind, SchemaChangeKind::ColumnAdded);
        assert_eq!(forward[0].table, "t");
        assert_eq!(forward[0].column.as_deref(), Some("b"));

        let backward = diff_schemas(&s2, &s1);
        assert_eq!(backward.len(), 1);
        assert_eq!(backward[0].kind, SchemaChangeKind::ColumnRemoved);
        assert_eq!(backward[0].column.as_deref(), Some("b"));
    }

    #[test]
    fn test_table_added_and_removed() {
        let s1 = schema_of(vec![make_table("a", vec![make_column("id", "INTEGER")])]);
        let s2 = schema_of(vec![
            make_table("a", vec![make_column("id", "INTEGER")]),
            make_table("b", vec![make_column("id", "INTEGER")]),
        ]);

        let changes = diff_schemas(&s1, &s2);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, SchemaChangeKind::TableAdded);
        assert_eq!(changes[0].table, "b");

        let changes = diff_schemas(&s2, &s1);
        assert_eq!(changes[0].kind, SchemaChangeKind::TableRemoved);
    }

    #[test]
    fn test_column_modified_carries_old_and_new() {
        let mut old_col = make_column("email", "TEXT");
        old_col.is_nullable = true;
        let mut new_col = make_column("email", "TEXT");
        new_col.is_nullable = false;

        let s1 = schema_of(vec![make_table("users", vec![old_col])]);
        let s2 = schema_of(vec![make_table("users", vec![new_col])]);

        let changes = diff_schemas(&s1, &s2);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, SchemaChangeKind::ColumnModified);
        assert_eq!(changes[0].detail["old"]["nullable"], json!(true));
        assert_eq!(changes[0].detail["new"]["nullable"], json!(false));
    }

    #[test]
    fn test_identical_schemas_diff_empty() {
        let s = schema_of(vec![make_table(
            "t",
            vec![make_column("id", "INTEGER"), make_column("a", "TEXT")],
        )]);
        assert!(diff_schemas(&s, &s.clone()).is_empty());
    }

    #[test]
    fn test_cross_dialect_equivalent_types_not_reported() {
        // SQLite spellings on one side, PostgreSQL on the other.
        let source = schema_of(vec![make_table(
            "t",
            vec![
                make_column("id", "INTEGER"),
                make_column("name", "TEXT"),
                make_column("created", "DATETIME"),
            ],
        )]);
        let target = schema_of(vec![make_table(
            "t",
            vec![
                make_column("id", "int8"),
                make_column("name", "text"),
                make_column("created", "timestamp"),
            ],
        )]);

        let result =
            compare_schemas(&source, &target, Dialect::Sqlite, Dialect::Postgres).unwrap();
        assert!(result.compatible, "differences: {:?}", result.differences);
        assert!(result.sql_statements.is_empty());
    }

    #[test]
    fn test_cross_dialect_missing_table_generates_create() {
        let source = schema_of(vec![make_table(
            "events",
            vec![make_column("id", "INTEGER"), make_column("payload", "TEXT")],
        )]);
        let target = schema_of(vec![]);

        let result =
            compare_schemas(&source, &target, Dialect::Sqlite, Dialect::Postgres).unwrap();
        assert!(!result.compatible);
        assert_eq!(result.differences.len(), 1);
        assert_eq!(result.differences[0].kind, SchemaChangeKind::TableAdded);
        assert_eq!(result.sql_statements.len(), 1);
        assert!(result.sql_statements[0].starts_with("CREATE TABLE \"events\""));
        assert!(result.sql_statements[0].contains("\"payload\" text"));
    }

    #[test]
    fn test_cross_dialect_missing_column_generates_add() {
        let source = schema_of(vec![make_table(
            "t",
            vec![make_column("id", "INTEGER"), make_column("b", "VARCHAR(50)")],
        )]);
        let target = schema_of(vec![make_table("t", vec![make_column("id", "int8")])]);

        let result =
            compare_schemas(&source, &target, Dialect::Sqlite, Dialect::Postgres).unwrap();
        assert_eq!(result.sql_statements.len(), 1);
        assert_eq!(
            result.sql_statements[0],
            "ALTER TABLE \"t\" ADD COLUMN \"b\" varchar(50)"
        );
    }

    #[test]
    fn test_create_table_postgres_identity() {
        let mut id = make_column("id", "INTEGER");
        id.is_primary_key = true;
        id.is_auto_increment = true;
        id.is_nullable = false;
        let table = make_table("users", vec![id, make_column("name", "TEXT")]);

        let mut warnings = Vec::new();
        let sql =
            generate_create_table(&table, Dialect::Sqlite, Dialect::Postgres, &mut warnings)
                .unwrap();

        assert!(sql.contains("\"id\" bigint GENERATED BY DEFAULT AS IDENTITY NOT NULL"));
        assert!(sql.contains("PRIMARY KEY (\"id\")"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_create_table_sqlite_rowid_alias_and_inline_fk() {
        let mut id = make_column("id", "int4");
        id.is_primary_key = true;
        id.is_auto_increment = true;
        id.is_nullable = false;
        let mut table = make_table(
            "orders",
            vec![id, make_column("customer_id", "int8")],
        );
        table.foreign_keys.push(ForeignKeyInfo {
            name: "orders_customer_fk".to_string(),
            column: "customer_id".to_string(),
            referenced_table: "customers".to_string(),
            referenced_column: "id".to_string(),
            on_delete: "CASCADE".to_string(),
            on_update: "NO ACTION".to_string(),
        });

        let mut warnings = Vec::new();
        let sql =
            generate_create_table(&table, Dialect::Postgres, Dialect::Sqlite, &mut warnings)
                .unwrap();

        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY"));
        assert!(!sql.contains("PRIMARY KEY (\"id\")"));
        assert!(sql.contains(
            "FOREIGN KEY (\"customer_id\") REFERENCES \"customers\" (\"id\") ON DELETE CASCADE"
        ));
    }

    #[test]
    fn test_portable_defaults() {
        assert_eq!(portable_default("42"), Some("42".to_string()));
        assert_eq!(portable_default("'x'::text"), Some("'x'".to_string()));
        assert_eq!(
            portable_default("current_timestamp"),
            Some("CURRENT_TIMESTAMP".to_string())
        );
        assert_eq!(portable_default("nextval('users_id_seq'::regclass)"), None);
    }

    #[test]
    fn test_generate_create_index() {
        let index = IndexInfo {
            name: "idx_users_email".to_string(),
            columns: vec!["email".to_string()],
            is_unique: true,
        };
        let sql = generate_create_index("users", &index, Dialect::Postgres).unwrap();
        assert_eq!(
            sql,
            "CREATE UNIQUE INDEX IF NOT EXISTS \"idx_users_email\" ON \"users\" (\"email\")"
        );
    }
}
