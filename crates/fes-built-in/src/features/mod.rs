//! Built-in feature plugins. Each owns one top-level config key.

pub mod alias;
pub mod define;
pub mod dev_server;
pub mod output_path;
pub mod public_path;

use serde_json::{Map, Value};

/// Returns `value[key]` as an object, inserting an empty one when missing or
/// of another type.
pub(crate) fn object_entry<'a>(value: &'a mut Value, key: &str) -> Option<&'a mut Map<String, Value>> {
    let map = value.as_object_mut()?;
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    entry.as_object_mut()
}
