//! Configuration validation.

use crate::dialect::Dialect;
use crate::error::{BridgeError, Result};

use super::types::{Config, EndpointConfig};

/// Validate a configuration, collecting per-endpoint requirements.
pub fn validate(config: &Config) -> Result<()> {
    validate_endpoint(&config.source, "source")?;
    validate_endpoint(&config.target, "target")?;

    if config.options.schema_only && config.options.data_only {
        return Err(BridgeError::Config(
            "schema_only and data_only are mutually exclusive".into(),
        ));
    }

    if let Some(batch) = config.options.batch_size {
        if batch == 0 {
            return Err(BridgeError::Config("batch_size must be at least 1".into()));
        }
    }

    if let Some(workers) = config.options.parallel_workers {
        if workers == 0 {
            return Err(BridgeError::Config(
                "parallel_workers must be at least 1".into(),
            ));
        }
    }

    Ok(())
}

fn validate_endpoint(endpoint: &EndpointConfig, side: &str) -> Result<()> {
    // Unsupported dialects fail here, before any connection attempt.
    let dialect = Dialect::parse(&endpoint.dialect)?;

    match dialect {
        Dialect::Sqlite => {
            if endpoint.path.is_none() {
                return Err(BridgeError::Config(format!(
                    "{}: sqlite endpoint requires 'path'",
                    side
                )));
            }
        }
        Dialect::Postgres => {
            for (field, value) in [
                ("host", endpoint.host.as_deref()),
                ("database", endpoint.database.as_deref()),
                ("user", endpoint.user.as_deref()),
            ] {
                if value.map(str::is_empty).unwrap_or(true) {
                    return Err(BridgeError::Config(format!(
                        "{}: postgres endpoint requires '{}'",
                        side, field
                    )));
                }
            }
        }
    }

    Ok(())
}
