//! Pure type normalization between dialects.
//!
//! [`normalize_type`] is the composed source → canonical → target
//! mapping; [`canonicalize`] is the half the differ uses to compare
//! types across dialects without rendering them into either one.

use crate::core::schema::{ColumnInfo, TableInfo};

use super::canonical::{from_canonical, to_canonical, CanonicalTypeInfo, TypeMapping};
use super::Dialect;

/// Map a native type string from one dialect to another.
///
/// Pure: same inputs always produce the same mapping. Unknown types
/// pass through unchanged with a recorded warning, never a hard
/// failure. A same-dialect call is the identity mapping.
pub fn normalize_type(native: &str, source: Dialect, target: Dialect) -> TypeMapping {
    if source == target {
        return TypeMapping::lossless(native);
    }

    let canonical = to_canonical(source, native, 0, 0, 0);
    let mut mapping = from_canonical(target, &canonical.canonical_type);

    if canonical.is_lossy {
        mapping.is_lossy = true;
        mapping.warning = match (canonical.warning, mapping.warning.take()) {
            (Some(src), Some(tgt)) => Some(format!("{}; {}", src, tgt)),
            (Some(src), None) => Some(src),
            (None, tgt) => tgt,
        };
    }

    mapping
}

/// Convert a native type to its canonical form.
pub fn canonicalize(native: &str, dialect: Dialect) -> CanonicalTypeInfo {
    to_canonical(dialect, native, 0, 0, 0)
}

/// Map a column into a target dialect using its full catalog metadata.
///
/// Prefer this over [`normalize_type`] when a [`ColumnInfo`] is at
/// hand: engines like PostgreSQL report lengths and precision in
/// catalog fields rather than in the type string.
pub fn normalize_column(col: &ColumnInfo, source: Dialect, target: Dialect) -> TypeMapping {
    if source == target {
        return TypeMapping::lossless(col.data_type.clone());
    }

    let canonical = to_canonical(source, &col.data_type, col.max_length, col.precision, col.scale);
    let mut mapping = from_canonical(target, &canonical.canonical_type);

    if canonical.is_lossy {
        mapping.is_lossy = true;
        mapping.warning = match (canonical.warning, mapping.warning.take()) {
            (Some(src), Some(tgt)) => Some(format!("{}; {}", src, tgt)),
            (Some(src), None) => Some(src),
            (None, tgt) => tgt,
        };
    }

    mapping
}

/// Rewrite a table's column types from one dialect into another.
///
/// Produces the table as the target engine will declare it, plus any
/// lossy-mapping warnings gathered along the way. Used by the migration
/// manager so DDL generation and batch writing agree on target types.
pub fn remap_table_types(
    table: &TableInfo,
    source: Dialect,
    target: Dialect,
) -> (TableInfo, Vec<String>) {
    let mut remapped = table.clone();
    let mut warnings = Vec::new();

    if source == target {
        return (remapped, warnings);
    }

    for col in &mut remapped.columns {
        let canonical = to_canonical(source, &col.data_type, col.max_length, col.precision, col.scale);
        let mapping = from_canonical(target, &canonical.canonical_type);
        if let Some(w) = canonical.warning.as_deref() {
            warnings.push(format!("{}.{}: {}", table.name, col.name, w));
        }
        if let Some(w) = mapping.warning.as_deref() {
            warnings.push(format!("{}.{}: {}", table.name, col.name, w));
        }
        col.data_type = mapping.target_type;
    }

    (remapped, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnInfo, TableInfo};

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

    #[test]
    fn test_same_dialect_is_identity() {
        let mapping = normalize_type("tsvector", Dialect::Postgres, Dialect::Postgres);
        assert_eq!(mapping.target_type, "tsvector");
        assert!(!mapping.is_lossy);
    }

    #[test]
    fn test_sqlite_to_postgres() {
        assert_eq!(
            normalize_type("INTEGER", Dialect::Sqlite, Dialect::Postgres).target_type,
            "bigint"
        );
        assert_eq!(
            normalize_type("VARCHAR(100)", Dialect::Sqlite, Dialect::Postgres).target_type,
            "varchar(100)"
        );
        assert_eq!(
            normalize_type("DATETIME", Dialect::Sqlite, Dialect::Postgres).target_type,
            "timestamp"
        );
    }

    #[test]
    fn test_postgres_to_sqlite() {
        assert_eq!(
            normalize_type("int4", Dialect::Postgres, Dialect::Sqlite).target_type,
            "INTEGER"
        );
        let uuid = normalize_type("uuid", Dialect::Postgres, Dialect::Sqlite);
        assert_eq!(uuid.target_type, "TEXT");
        assert!(uuid.is_lossy);
    }

    #[test]
    fn test_unknown_passes_through_with_warning() {
        let mapping = normalize_type("tsvector", Dialect::Postgres, Dialect::Sqlite);
        assert_eq!(mapping.target_type, "tsvector");
        assert!(mapping.is_lossy);
        assert!(mapping.warning.unwrap().contains("tsvector"));
    }

    #[test]
    fn test_normalize_column_uses_catalog_metadata() {
        // PostgreSQL reports the length in the catalog, not the type
        // string.
        let mut col = make_column("email", "varchar");
        col.max_length = 120;
        let mapping = normalize_column(&col, Dialect::Postgres, Dialect::Sqlite);
        assert_eq!(mapping.target_type, "VARCHAR(120)");

        let mut col = make_column("price", "numeric");
        col.precision = 10;
        col.scale = 2;
        let mapping = normalize_column(&col, Dialect::Postgres, Dialect::Sqlite);
        assert_eq!(mapping.target_type, "DECIMAL(10,2)");
    }

    #[test]
    fn test_remap_table_types_collects_warnings() {
        let table = TableInfo {
            name: "events".to_string(),
            schema: None,
            columns: vec![make_column("id", "uuid"), make_column("payload", "jsonb")],
            primary_key: vec!["id".to_string()],
            indexes: vec![],
            foreign_keys: vec![],
            row_count: 0,
        };

        let (remapped, warnings) = remap_table_types(&table, Dialect::Postgres, Dialect::Sqlite);
        assert_eq!(remapped.columns[0].data_type, "TEXT");
        assert_eq!(remapped.columns[1].data_type, "TEXT");
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("events.id"));
    }
}
