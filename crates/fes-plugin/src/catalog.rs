//! Plugin catalog: the user plugins a project may opt into by id.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::PluginError;
use crate::registry::PluginDescriptor;

/// Known user plugins, keyed by id.
///
/// A project selects plugins by listing their ids under `plugins` in its
/// configuration; only the selected ones reach the registry.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    entries: BTreeMap<String, PluginDescriptor>,
}

impl PluginCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor, replacing any previous entry with the same id.
    pub fn insert(&mut self, descriptor: PluginDescriptor) {
        if self.entries.contains_key(&descriptor.id) {
            debug!(plugin_id = %descriptor.id, "Replacing catalog entry");
        }
        self.entries.insert(descriptor.id.clone(), descriptor);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, descriptor: PluginDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    /// Gets a descriptor by id.
    pub fn get(&self, plugin_id: &str) -> Option<&PluginDescriptor> {
        self.entries.get(plugin_id)
    }

    /// Ids of all catalog entries, sorted.
    pub fn ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Number of plugins in the catalog.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the catalog holds no plugins.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the descriptors for `ids`, in the given order.
    pub fn select<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<PluginDescriptor>, PluginError> {
        ids.iter()
            .map(|id| {
                let id = id.as_ref();
                self.entries
                    .get(id)
                    .cloned()
                    .ok_or_else(|| PluginError::PluginNotFound { id: id.to_string() })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PluginKind;

    fn plugin(id: &str) -> PluginDescriptor {
        PluginDescriptor::from_fn(id, PluginKind::User, |_api| async { Ok(()) })
    }

    #[test]
    fn test_select_preserves_requested_order() {
        let catalog = PluginCatalog::new()
            .with(plugin("fes-plugin-access"))
            .with(plugin("fes-plugin-layout"));

        let selected = catalog
            .select(&["fes-plugin-layout", "fes-plugin-access"])
            .unwrap();
        let ids: Vec<&str> = selected.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["fes-plugin-layout", "fes-plugin-access"]);
    }

    #[test]
    fn test_select_unknown_id() {
        let catalog = PluginCatalog::new().with(plugin("fes-plugin-access"));
        let err = catalog.select(&["fes-plugin-missing"]).unwrap_err();
        assert!(matches!(err, PluginError::PluginNotFound { id } if id == "fes-plugin-missing"));
    }
}
