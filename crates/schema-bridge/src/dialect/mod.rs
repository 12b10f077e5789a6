//! Dialect identification and capability reporting.
//!
//! The dialect is parsed from its string identifier exactly once, at
//! factory-construction time. Everything downstream dispatches on the
//! closed [`Dialect`] enum, so an unsupported dialect fails before any
//! discovery work begins rather than surfacing as a no-op service.

pub mod canonical;
pub mod typemap;

pub use canonical::{coerce_value, CanonicalType, CanonicalTypeInfo, TypeMapping};
pub use typemap::{canonicalize, normalize_type};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::identifier::{quote_pg, quote_sqlite};
use crate::error::{BridgeError, Result};

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Embedded file-based engine with a PRAGMA-style catalog.
    Sqlite,
    /// Client/server engine with information_schema + pg_catalog.
    Postgres,
}

impl Dialect {
    /// Parse a dialect identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnsupportedDialect`] for anything other
    /// than the supported identifiers and their common aliases.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            other => Err(BridgeError::UnsupportedDialect(other.to_string())),
        }
    }

    /// The canonical dialect name.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }

    /// Static capability lookup for this dialect.
    ///
    /// Callers use this to skip unsupported analysis instead of
    /// attempting it and failing.
    pub fn capabilities(&self) -> DialectCapabilities {
        match self {
            Dialect::Sqlite => DialectCapabilities {
                supports_views: true,
                supports_schemas: false,
                supports_deferred_constraints: true,
                supports_alter_column: false,
                supports_add_constraint: false,
                supports_sequences: false,
            },
            Dialect::Postgres => DialectCapabilities {
                supports_views: true,
                supports_schemas: true,
                supports_deferred_constraints: true,
                supports_alter_column: true,
                supports_add_constraint: true,
                supports_sequences: true,
            },
        }
    }

    /// Quote an identifier for this dialect.
    pub fn quote_ident(&self, name: &str) -> Result<String> {
        match self {
            Dialect::Sqlite => quote_sqlite(name),
            Dialect::Postgres => quote_pg(name),
        }
    }
}

impl FromStr for Dialect {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Dialect::parse(s)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a dialect can and cannot do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectCapabilities {
    /// Whether the engine supports views.
    pub supports_views: bool,

    /// Whether tables live in named schemas.
    pub supports_schemas: bool,

    /// Whether constraint checking can be deferred.
    pub supports_deferred_constraints: bool,

    /// Whether ALTER TABLE can modify an existing column's type.
    pub supports_alter_column: bool,

    /// Whether constraints can be added after table creation
    /// (ALTER TABLE ... ADD CONSTRAINT).
    pub supports_add_constraint: bool,

    /// Whether auto-increment keys are sequence-backed.
    pub supports_sequences: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_dialects() {
        assert_eq!(Dialect::parse("sqlite").unwrap(), Dialect::Sqlite);
        assert_eq!(Dialect::parse("sqlite3").unwrap(), Dialect::Sqlite);
        assert_eq!(Dialect::parse("postgres").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::parse("PostgreSQL").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::parse("pg").unwrap(), Dialect::Postgres);
    }

    #[test]
    fn test_parse_unknown_dialect_fails_fast() {
        let err = Dialect::parse("oracle").unwrap_err();
        assert!(err.to_string().contains("Unsupported dialect"));
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn test_capabilities_lookup() {
        assert!(!Dialect::Sqlite.capabilities().supports_schemas);
        assert!(!Dialect::Sqlite.capabilities().supports_add_constraint);
        assert!(Dialect::Postgres.capabilities().supports_sequences);
        assert!(Dialect::Postgres.capabilities().supports_views);
    }

    #[test]
    fn test_quote_ident_dispatch() {
        assert_eq!(Dialect::Postgres.quote_ident("t").unwrap(), "\"t\"");
        assert_eq!(Dialect::Sqlite.quote_ident("t").unwrap(), "\"t\"");
    }
}
