//! Configuration type definitions with auto-tuning based on system resources.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::info;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in GB.
    pub total_memory_gb: f64,
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            total_memory_gb: sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0),
            cpu_cores: sys.cpus().len(),
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database endpoint.
    pub source: EndpointConfig,

    /// Target database endpoint.
    pub target: EndpointConfig,

    /// Migration behavior options.
    #[serde(default)]
    pub options: MigrationOptions,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            resources.total_memory_gb, resources.cpu_cores
        );
        self.options = self.options.with_auto_tuning(&resources);
        self
    }
}

/// One side of a migration: dialect plus connection parameters.
///
/// Which fields matter depends on the dialect: SQLite uses `path`,
/// PostgreSQL uses host/port/database/user/password/schema/ssl_mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Dialect identifier ("sqlite" or "postgres"). Parsed and
    /// validated at factory-construction time.
    pub dialect: String,

    /// Database file path (SQLite). ":memory:" opens an in-memory
    /// database.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Database host (PostgreSQL).
    #[serde(default)]
    pub host: Option<String>,

    /// Database port (PostgreSQL, default 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name (PostgreSQL).
    #[serde(default)]
    pub database: Option<String>,

    /// Username (PostgreSQL).
    #[serde(default)]
    pub user: Option<String>,

    /// Password (PostgreSQL).
    #[serde(default)]
    pub password: Option<String>,

    /// Schema to introspect (PostgreSQL, default "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode (PostgreSQL, default "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,

    /// Maximum pool connections. Auto-sized from workers if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
}

impl EndpointConfig {
    /// A SQLite endpoint for the given file path.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            dialect: "sqlite".to_string(),
            path: Some(path.into()),
            host: None,
            port: default_pg_port(),
            database: None,
            user: None,
            password: None,
            schema: default_public_schema(),
            ssl_mode: default_disable(),
            max_connections: None,
        }
    }

    /// Whether this endpoint points at an in-memory SQLite database.
    pub fn is_memory(&self) -> bool {
        self.path
            .as_deref()
            .map(|p| p.to_string_lossy() == ":memory:")
            .unwrap_or(false)
    }
}

/// Migration behavior options.
///
/// Performance-related fields use `Option<T>` to distinguish "not set"
/// (use auto-tuned default) from "explicitly set".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Migrate schema only; skip the data phase.
    #[serde(default)]
    pub schema_only: bool,

    /// Migrate data only; skip target schema creation.
    #[serde(default)]
    pub data_only: bool,

    /// Rows per batch. Auto-tuned based on RAM if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Transfer tables with parallel workers.
    #[serde(default)]
    pub parallel: bool,

    /// Number of parallel workers. Auto-tuned based on CPU cores if
    /// not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_workers: Option<usize>,

    /// Drop and recreate target tables that already exist.
    #[serde(default)]
    pub drop_tables: bool,

    /// On a table-level data error, skip the table and continue
    /// instead of aborting the migration.
    #[serde(default)]
    pub continue_on_error: bool,

    /// Tables to include (empty = all).
    #[serde(default)]
    pub include_tables: Vec<String>,

    /// Tables to exclude.
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Generate SQL and report work without touching the target.
    #[serde(default)]
    pub dry_run: bool,

    /// Create secondary indexes on the target (default: true).
    #[serde(default = "default_true")]
    pub create_indexes: bool,

    /// Create foreign keys on the target (default: true).
    #[serde(default = "default_true")]
    pub create_foreign_keys: bool,

    /// Verify row counts after the data phase (default: true).
    #[serde(default = "default_true")]
    pub verify_row_counts: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            schema_only: false,
            data_only: false,
            batch_size: None,
            parallel: false,
            parallel_workers: None,
            drop_tables: false,
            continue_on_error: false,
            include_tables: Vec::new(),
            exclude_tables: Vec::new(),
            dry_run: false,
            create_indexes: true,
            create_foreign_keys: true,
            verify_row_counts: true,
        }
    }
}

impl MigrationOptions {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that are None.
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        let cores = resources.cpu_cores;
        let ram_gb = resources.total_memory_gb;

        // Workers: cores - 2, clamped to 2..=16
        if self.parallel_workers.is_none() {
            self.parallel_workers = Some(cores.saturating_sub(2).clamp(2, 16));
        }

        // Batch size: 5K base, +5K per 8GB of RAM, cap at 50K
        if self.batch_size.is_none() {
            let batch = 5_000 + (ram_gb / 8.0) as usize * 5_000;
            self.batch_size = Some(batch.clamp(5_000, 50_000));
        }

        info!(
            "Auto-tuned options: workers={}, batch_size={}",
            self.parallel_workers.unwrap_or(0),
            self.batch_size.unwrap_or(0),
        );

        self
    }

    /// Effective batch size, with a fallback default.
    pub fn get_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(5_000)
    }

    /// Effective worker count. 1 unless parallel transfer is enabled.
    pub fn get_parallel_workers(&self) -> usize {
        if !self.parallel {
            return 1;
        }
        self.parallel_workers.unwrap_or(4).max(1)
    }
}

// Default value functions for serde

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let opts = MigrationOptions::default();
        assert!(!opts.schema_only);
        assert!(!opts.parallel);
        assert!(opts.create_indexes);
        assert!(opts.create_foreign_keys);
        assert!(opts.verify_row_counts);
        assert_eq!(opts.get_batch_size(), 5_000);
        assert_eq!(opts.get_parallel_workers(), 1);
    }

    #[test]
    fn test_parallel_workers_requires_parallel_flag() {
        let opts = MigrationOptions {
            parallel_workers: Some(8),
            ..Default::default()
        };
        assert_eq!(opts.get_parallel_workers(), 1);

        let opts = MigrationOptions {
            parallel: true,
            parallel_workers: Some(8),
            ..Default::default()
        };
        assert_eq!(opts.get_parallel_workers(), 8);
    }

    #[test]
    fn test_auto_tuning_respects_explicit_values() {
        let resources = SystemResources {
            total_memory_gb: 64.0,
            cpu_cores: 32,
        };
        let opts = MigrationOptions {
            batch_size: Some(100),
            ..Default::default()
        }
        .with_auto_tuning(&resources);

        assert_eq!(opts.batch_size, Some(100));
        assert_eq!(opts.parallel_workers, Some(16));
    }

    #[test]
    fn test_sqlite_endpoint_helper() {
        let ep = EndpointConfig::sqlite(":memory:");
        assert_eq!(ep.dialect, "sqlite");
        assert!(ep.is_memory());

        let ep = EndpointConfig::sqlite("/tmp/app.db");
        assert!(!ep.is_memory());
    }
}
