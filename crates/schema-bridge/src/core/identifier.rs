//! Identifier validation and per-dialect quoting.
//!
//! Identifiers cannot be passed as parameters in prepared statements,
//! so every table/column name that reaches generated SQL goes through
//! these functions: validate for suspicious content, then apply
//! dialect-specific quoting with in-quote escaping.

use crate::error::{BridgeError, Result};

/// Conservative maximum identifier length across both engines
/// (PostgreSQL: 63 bytes; SQLite: effectively unbounded).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier before it is embedded in SQL.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers over [`MAX_IDENTIFIER_LENGTH`] bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BridgeError::Config("Identifier cannot be empty".into()));
    }

    if name.contains('\0') {
        return Err(BridgeError::Config(format!(
            "Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(BridgeError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier with double quotes.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a SQLite identifier.
///
/// SQLite also accepts double-quoted identifiers; the escaping rule is
/// the same as PostgreSQL's.
pub fn quote_sqlite(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}
