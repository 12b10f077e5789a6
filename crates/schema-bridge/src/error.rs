//! Error types for schema discovery and migration.

use thiserror::Error;

/// Main error type for discovery, watch, and migration operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dialect identifier not recognized by the factory.
    #[error("Unsupported dialect: '{0}'. Supported dialects: sqlite, postgres")]
    UnsupportedDialect(String),

    /// PostgreSQL connection or query error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// SQLite connection or query error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// Connection pool error with context about where it occurred.
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Catalog introspection failed.
    #[error("Introspection failed: {0}")]
    Introspection(String),

    /// Data transfer failed for a specific table.
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// Value could not be converted across the type-system boundary.
    #[error("Type conversion failed for {column}: {message}")]
    TypeConversion { column: String, message: String },

    /// Schema watcher failure (retries exhausted, invalid state transition).
    #[error("Watcher error: {0}")]
    Watch(String),

    /// Row count or referential validation failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// IO error (file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Create a Pool error with context about where it occurred.
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        BridgeError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transfer error.
    pub fn transfer(table: impl Into<String>, message: impl ToString) -> Self {
        BridgeError::Transfer {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a TypeConversion error.
    pub fn conversion(column: impl Into<String>, message: impl ToString) -> Self {
        BridgeError::TypeConversion {
            column: column.into(),
            message: message.to_string(),
        }
    }

    /// Format error with full details including the error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for schema-bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
