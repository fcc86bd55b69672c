//! Static user configuration.
//!
//! The project configuration is a plain declarative document read once,
//! before any plugin runs. It is layered with the `config` crate:
//!
//! 1. `.fesrc.{toml,json,yaml}` in the project root
//! 2. `.fesrc.<env>.*`
//! 3. `.fesrc.local.*` (development only)
//! 4. `FES__*` environment variables (`FES__DEV_SERVER__PORT=9000`)
//!
//! The raw merged document is what plugins see. [`UserConfig`] is the typed
//! view over the options the host itself recognises and is only used to
//! validate them.

pub mod logging;
pub mod resolver;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use validator::{Validate, ValidationError};

use crate::error::FesError;
use crate::types::Env;

pub use self::logging::LoggingConfig;
pub use self::resolver::{ConfigResolver, ConfigSchema};

/// File stem of the project configuration files.
pub const CONFIG_FILE_STEM: &str = ".fesrc";

/// Typed view of the recognised top-level options.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UserConfig {
    /// Router base path.
    #[serde(default)]
    #[validate(custom(function = "validate_base"))]
    pub base: Option<String>,
    /// Compile-time constants.
    #[serde(default)]
    pub define: Map<String, Value>,
    /// Public path assets are served from.
    #[serde(default)]
    pub public_path: Option<String>,
    /// Access control: role → routes it may visit.
    #[serde(default)]
    pub access: AccessConfig,
    /// Layout and theming options.
    #[serde(default)]
    pub layout: Option<Value>,
    /// Locale options.
    #[serde(default)]
    pub locale: Option<Value>,
    /// Dev-server options.
    #[serde(default)]
    #[validate(nested)]
    pub dev_server: DevServerConfig,
    /// Enum declarations exposed to the application.
    #[serde(default)]
    pub enums: BTreeMap<String, Value>,
    /// Output directory, relative to the project root.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Module aliases.
    #[serde(default)]
    pub alias: BTreeMap<String, String>,
    /// Third-party plugin ids to activate, in order.
    #[serde(default)]
    pub plugins: Vec<String>,
    /// Options owned by plugins.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Access-control options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Role name → route paths.
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<String>>,
}

/// Dev-server options.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DevServerConfig {
    /// Listen port.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub port: Option<u16>,
}

/// The loaded project configuration: the raw document and its typed view.
#[derive(Debug, Clone)]
pub struct StaticConfig {
    /// Merged document, passed on to the resolver untouched.
    pub raw: Value,
    /// Typed, validated view of the host options.
    pub user: UserConfig,
}

impl StaticConfig {
    /// Loads and validates the layered project configuration for `cwd`.
    pub fn load(cwd: &Path, env: Env) -> Result<Self, FesError> {
        let stem = cwd.join(CONFIG_FILE_STEM);
        let stem = stem.to_string_lossy();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(&stem).required(false))
            .add_source(config::File::with_name(&format!("{stem}.{env}")).required(false));

        if !env.is_production() {
            builder = builder
                .add_source(config::File::with_name(&format!("{stem}.local")).required(false));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("FES")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let raw: Value = config.try_deserialize()?;
        debug!(cwd = %cwd.display(), env = %env, "Loaded project configuration");
        Self::from_value(raw)
    }

    /// Validates an already-merged configuration document.
    pub fn from_value(raw: Value) -> Result<Self, FesError> {
        let raw = match raw {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => raw,
            other => {
                return Err(FesError::validation(format!(
                    "Configuration must be an object, got {other}"
                )));
            }
        };

        let user: UserConfig = serde_json::from_value(raw.clone())?;
        user.validate()?;

        Ok(Self { raw, user })
    }
}

fn validate_base(base: &str) -> Result<(), ValidationError> {
    if base.starts_with('/') {
        Ok(())
    } else {
        Err(ValidationError::new("base_must_start_with_slash"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_accepts_plugin_keys() {
        let config = StaticConfig::from_value(json!({
            "public_path": "/static/",
            "plugins": ["fes-plugin-access"],
            "access": { "roles": { "admin": ["/", "/admin"] } },
            "custom_plugin_key": { "enabled": true }
        }))
        .unwrap();

        assert_eq!(config.user.public_path.as_deref(), Some("/static/"));
        assert_eq!(config.user.plugins, vec!["fes-plugin-access".to_string()]);
        assert_eq!(config.user.access.roles["admin"].len(), 2);
        assert!(config.user.extra.contains_key("custom_plugin_key"));
    }

    #[test]
    fn test_invalid_base_rejected() {
        let err = StaticConfig::from_value(json!({ "base": "app" })).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Validation);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(StaticConfig::from_value(json!([1, 2])).is_err());
        assert!(StaticConfig::from_value(Value::Null).is_ok());
    }

    #[test]
    fn test_load_layers_env_overlay() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".fesrc.toml"),
            "public_path = \"/\"\noutput_path = \"dist\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(".fesrc.production.toml"),
            "public_path = \"/cdn/\"\n",
        )
        .unwrap();

        let prod = StaticConfig::load(dir.path(), Env::Production).unwrap();
        assert_eq!(prod.user.public_path.as_deref(), Some("/cdn/"));
        assert_eq!(prod.user.output_path.as_deref(), Some("dist"));

        let dev = StaticConfig::load(dir.path(), Env::Development).unwrap();
        assert_eq!(dev.user.public_path.as_deref(), Some("/"));
    }

    #[test]
    fn test_local_overlay_only_in_development() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".fesrc.toml"), "base = \"/\"\n").unwrap();
        std::fs::write(dir.path().join(".fesrc.local.toml"), "base = \"/local/\"\n").unwrap();

        let dev = StaticConfig::load(dir.path(), Env::Development).unwrap();
        assert_eq!(dev.user.base.as_deref(), Some("/local/"));

        let prod = StaticConfig::load(dir.path(), Env::Production).unwrap();
        assert_eq!(prod.user.base.as_deref(), Some("/"));
    }
}
