//! Core abstractions shared by every component.
//!
//! - [`schema`]: canonical table/column/index/relationship metadata
//! - [`value`]: SQL value representation for cross-engine row transfer
//! - [`traits`]: the capability interface and reader/writer seams
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{
    ColumnInfo, ForeignKeyInfo, IndexInfo, RelationshipInfo, RelationshipKind, SchemaChange,
    SchemaChangeKind, SchemaInfo, TableInfo, ViewInfo,
};
pub use traits::{DatabaseEngine, Introspector, SourceReader, TargetWriter};
pub use value::{Batch, SqlNullType, SqlValue};
