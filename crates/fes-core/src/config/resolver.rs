//! Config resolver: merges the user document with plugin-declared defaults.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::FesError;

/// Keys the host reads itself and that no plugin needs to declare.
pub const RESERVED_KEYS: &[&str] = &["plugins"];

/// A top-level config key owned by a plugin, with its default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    /// Plugin that owns the key.
    pub plugin_id: String,
    /// Top-level key in the user configuration.
    pub key: String,
    /// Value used when the user leaves the key out.
    pub default: Value,
}

/// Produces the effective static configuration handed to plugins.
#[derive(Debug)]
pub struct ConfigResolver<'a> {
    /// Declared schemas, in plugin registration order.
    schemas: &'a [ConfigSchema],
}

impl<'a> ConfigResolver<'a> {
    /// Creates a resolver over the given schemas.
    pub fn new(schemas: &'a [ConfigSchema]) -> Self {
        Self { schemas }
    }

    /// Merges `user` over the declared defaults.
    ///
    /// Object defaults are merged key by key with the user value winning;
    /// any other user value replaces the default outright. A user value of
    /// `false` is kept so plugins enabled by config can be switched off.
    pub fn resolve(&self, user: &Value) -> Result<Value, FesError> {
        let mut resolved = match user {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(FesError::validation(format!(
                    "Configuration must be an object, got {other}"
                )));
            }
        };

        let mut owners: HashMap<&str, &str> = HashMap::new();
        for schema in self.schemas {
            if let Some(owner) = owners.insert(&schema.key, &schema.plugin_id) {
                return Err(FesError::validation(format!(
                    "Config key '{}' is declared by both '{}' and '{}'",
                    schema.key, owner, schema.plugin_id
                )));
            }

            let merged = match resolved.remove(&schema.key) {
                Some(user_value) => deep_merge(schema.default.clone(), user_value),
                None => schema.default.clone(),
            };
            resolved.insert(schema.key.clone(), merged);
        }

        for key in resolved.keys() {
            if !owners.contains_key(key.as_str()) && !RESERVED_KEYS.contains(&key.as_str()) {
                warn!(key = %key, "Config key is not declared by any plugin");
            }
        }

        debug!(keys = resolved.len(), "Configuration resolved");
        Ok(Value::Object(resolved))
    }
}

/// Recursively merges `overlay` into `base`; the overlay wins on conflicts.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}
