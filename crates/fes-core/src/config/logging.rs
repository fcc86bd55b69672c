//! Logging configuration.

use serde::{Deserialize, Serialize};

use crate::error::FesError;

/// Logging and tracing configuration.
///
/// Read from `FES_LOG_LEVEL` / `FES_LOG_FORMAT`, independent of the project
/// configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `"trace"`, `"debug"`, `"info"`, `"warn"`, `"error"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Log format: `"json"` or `"pretty"`.
    #[serde(default = "default_format")]
    pub format: String,
}

impl LoggingConfig {
    /// Loads logging settings from `FES_LOG_*` environment variables.
    pub fn load() -> Result<Self, FesError> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("FES_LOG").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}
