//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::Result;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA-256 hash of the configuration, for detecting
    /// config drift between runs.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl EndpointConfig {
    /// Build a tokio-postgres connection string.
    pub fn pg_connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host.as_deref().unwrap_or("localhost"),
            self.port,
            self.database.as_deref().unwrap_or_default(),
            self.user.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default(),
        )
    }

    /// Build a sqlx SQLite connection URL.
    pub fn sqlite_url(&self) -> String {
        match self.path.as_deref() {
            Some(p) if p.to_string_lossy() == ":memory:" => "sqlite::memory:".to_string(),
            Some(p) => format!("sqlite://{}?mode=rwc", p.to_string_lossy()),
            None => "sqlite::memory:".to_string(),
        }
    }
}
