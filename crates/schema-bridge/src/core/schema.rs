//! Canonical schema metadata types.
//!
//! These types are the dialect-neutral representation of a database's
//! structure. Both introspectors normalize their engine's catalog output
//! into this model, and everything downstream (relationship inference,
//! diffing, watching, migration) operates on it exclusively.

use serde::{Deserialize, Serialize};

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name. Unique within the owning table.
    pub name: String,

    /// Native data type string as reported by the engine
    /// (e.g. "INTEGER", "varchar", "timestamptz").
    pub data_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Default value expression, verbatim from the catalog.
    pub default_value: Option<String>,

    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,

    /// Whether the column is auto-incremented (rowid alias, identity,
    /// or sequence-backed default, depending on dialect).
    pub is_auto_increment: bool,

    /// Maximum length for string/binary types (0 when not applicable,
    /// -1 for unbounded).
    pub max_length: i32,

    /// Numeric precision (0 when not applicable).
    pub precision: i32,

    /// Numeric scale (0 when not applicable).
    pub scale: i32,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,
}

impl ColumnInfo {
    /// The (type, nullable, primary-key) triple used for structural
    /// comparison by the differ and the watcher hash.
    pub fn signature(&self) -> (String, bool, bool) {
        (
            self.data_type.to_lowercase(),
            self.is_nullable,
            self.is_primary_key,
        )
    }
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Index name.
    pub name: String,

    /// Indexed column names, in key order.
    pub columns: Vec<String>,

    /// Whether the index is unique.
    pub is_unique: bool,
}

/// Foreign key metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    /// Constraint name. Synthesized for engines that do not name
    /// implicit constraints.
    pub name: String,

    /// Local column name.
    pub column: String,

    /// Referenced table name.
    pub referenced_table: String,

    /// Referenced column name. Empty when the constraint references
    /// the target table's implicit key.
    pub referenced_column: String,

    /// ON DELETE action (e.g. "NO ACTION", "CASCADE").
    pub on_delete: String,

    /// ON UPDATE action.
    pub on_update: String,
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,

    /// Schema/namespace, when the engine has one.
    pub schema: Option<String>,

    /// Column definitions in ordinal order.
    pub columns: Vec<ColumnInfo>,

    /// Primary key column names, in key order. Always a subset of
    /// `columns` names.
    pub primary_key: Vec<String>,

    /// Secondary indexes (primary key indexes excluded).
    pub indexes: Vec<IndexInfo>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKeyInfo>,

    /// Approximate row count at discovery time.
    pub row_count: i64,
}

impl TableInfo {
    /// Get the schema-qualified table name.
    pub fn full_name(&self) -> String {
        match &self.schema {
            Some(s) => format!("{}.{}", s, self.name),
            None => self.name.clone(),
        }
    }

    /// Find a column by name (case-insensitive, matching catalog
    /// behavior on both engines).
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Check if a column is part of the primary key.
    pub fn is_pk_column(&self, name: &str) -> bool {
        self.primary_key.iter().any(|c| c.eq_ignore_ascii_case(name))
    }
}

/// View metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewInfo {
    /// View name.
    pub name: String,

    /// Schema/namespace, when the engine has one.
    pub schema: Option<String>,

    /// The view's SQL definition text.
    pub definition: String,

    /// Tables referenced in the view body, extracted from FROM/JOIN
    /// clauses and de-duplicated.
    pub referenced_tables: Vec<String>,
}

/// Kind of an inferred relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationshipKind {
    /// The kind of the reverse relationship.
    pub fn inverse(self) -> Self {
        match self {
            RelationshipKind::OneToMany => RelationshipKind::ManyToOne,
            RelationshipKind::ManyToOne => RelationshipKind::OneToMany,
            RelationshipKind::ManyToMany => RelationshipKind::ManyToMany,
        }
    }
}

/// An inferred relationship between two tables.
///
/// Relationships are recomputed in full on every discovery pass and
/// never mutated incrementally. Names are diagnostic only; consumers
/// should key on the (from, to, kind) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipInfo {
    /// Diagnostic name derived from the participating tables/columns.
    pub name: String,

    /// Relationship kind.
    pub kind: RelationshipKind,

    /// Owning-side table.
    pub from_table: String,

    /// Owning-side column.
    pub from_column: String,

    /// Referenced-side table.
    pub to_table: String,

    /// Referenced-side column.
    pub to_column: String,

    /// Junction table, for many-to-many relationships.
    pub junction_table: Option<String>,

    /// The junction table's two linking columns, for many-to-many
    /// relationships: (column referencing `from_table`, column
    /// referencing `to_table`).
    pub junction_columns: Option<(String, String)>,
}

/// Immutable snapshot of a discovered schema.
///
/// Produced once per discovery pass and owned by the caller; discovery
/// components never share or mutate a snapshot after returning it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    /// Discovered tables.
    pub tables: Vec<TableInfo>,

    /// Inferred relationships.
    pub relationships: Vec<RelationshipInfo>,

    /// Discovered views.
    pub views: Vec<ViewInfo>,
}

impl SchemaInfo {
    /// Find a table by name (case-insensitive).
    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Table names in discovery order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Kind of a structural change between two schema snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaChangeKind {
    TableAdded,
    TableRemoved,
    ColumnAdded,
    ColumnRemoved,
    ColumnModified,
}

/// A single structural change, produced only by diffing two
/// [`SchemaInfo`] snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChange {
    /// What changed.
    pub kind: SchemaChangeKind,

    /// Affected table.
    pub table: String,

    /// Affected column, for column-level changes.
    pub column: Option<String>,

    /// Opaque detail payload (old/new values for modifications,
    /// column counts for table-level changes).
    pub detail: serde_json::Value,
}

impl SchemaChange {
    /// Create a table-level change with no column.
    pub fn table_level(kind: SchemaChangeKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            column: None,
            detail: serde_json::Value::Null,
        }
    }

    /// Attach a detail payload.
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
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
        TableInfo {
            name: name.to_string(),
            schema: None,
            columns,
            primary_key: vec![],
            indexes: vec![],
            foreign_keys: vec![],
            row_count: 0,
        }
    }

    #[test]
    fn test_full_name_with_and_without_schema() {
        let mut table = make_table("users", vec![]);
        assert_eq!(table.full_name(), "users");

        table.schema = Some("public".to_string());
        assert_eq!(table.full_name(), "public.users");
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let table = make_table("users", vec![make_column("CreatedAt", "timestamp")]);
        assert!(table.column("createdat").is_some());
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn test_pk_membership() {
        let mut table = make_table("users", vec![make_column("id", "integer")]);
        table.primary_key = vec!["id".to_string()];
        assert!(table.has_pk());
        assert!(table.is_pk_column("ID"));
        assert!(!table.is_pk_column("name"));
    }

    #[test]
    fn test_relationship_kind_inverse() {
        assert_eq!(
            RelationshipKind::OneToMany.inverse(),
            RelationshipKind::ManyToOne
        );
        assert_eq!(
            RelationshipKind::ManyToOne.inverse(),
            RelationshipKind::OneToMany
        );
        assert_eq!(
            RelationshipKind::ManyToMany.inverse(),
            RelationshipKind::ManyToMany
        );
    }

    #[test]
    fn test_column_signature_normalizes_case() {
        let mut col = make_column("id", "INTEGER");
        col.is_nullable = false;
        assert_eq!(col.signature(), ("integer".to_string(), false, false));
    }

    #[test]
    fn test_schema_change_serialization_round_trip() {
        let change = SchemaChange {
            kind: SchemaChangeKind::ColumnModified,
            table: "users".to_string(),
            column: Some("email".to_string()),
            detail: serde_json::json!({"old": {"type": "text"}, "new": {"type": "varchar"}}),
        };
        let json = serde_json::to_string(&change).unwrap();
        let back: SchemaChange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, change);
        assert!(json.contains("column_modified"));
    }
}
