//! Hook table: handlers per key, one hook type per key, in load order.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use super::definitions::{Hook, HookRecord, HookType};
use crate::error::PluginError;

/// Mutable table state behind the lock.
#[derive(Debug, Default)]
struct TableState {
    /// Hook key → records in registration order.
    records: HashMap<String, Vec<HookRecord>>,
    /// Hook key → the type it is bound to.
    key_types: HashMap<String, HookType>,
    /// Next registration sequence number.
    next_seq: u64,
}

/// Registry of hook handlers organized by key.
///
/// A key is bound to a hook type by its first registration or its first
/// `applyPlugins` call, whichever happens first. Bindings made by
/// `applyPlugins` on keys nobody registered live in `applied`, so the handler
/// table itself only changes while plugins are loading.
#[derive(Debug, Default)]
pub struct HookTable {
    inner: RwLock<TableState>,
    applied: RwLock<HashMap<String, HookType>>,
}

impl HookTable {
    /// Creates an empty hook table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler registered by `plugin_id`.
    pub async fn register(&self, plugin_id: &str, hook: Hook) -> Result<(), PluginError> {
        let hook_type = hook.handler.hook_type();
        let mut state = self.inner.write().await;

        if let Some(existing) = self.applied.read().await.get(&hook.key) {
            check_type(&hook.key, *existing, hook_type, Some(plugin_id))?;
        }
        bind_key(&mut state.key_types, &hook.key, hook_type, Some(plugin_id))?;

        let seq = state.next_seq;
        state.next_seq += 1;

        debug!(
            key = %hook.key,
            hook_type = %hook_type,
            plugin_id = %plugin_id,
            stage = hook.stage,
            "Hook handler registered"
        );

        state
            .records
            .entry(hook.key.clone())
            .or_default()
            .push(HookRecord {
                key: hook.key,
                plugin_id: plugin_id.to_string(),
                handler: hook.handler,
                stage: hook.stage,
                before: hook.before,
                seq,
            });

        Ok(())
    }

    /// Binds `key` to `hook_type` for an `applyPlugins` call, or checks it
    /// against the existing binding. Never writes to the handler table.
    pub async fn claim_key(&self, key: &str, hook_type: HookType) -> Result<(), PluginError> {
        if let Some(existing) = self.inner.read().await.key_types.get(key) {
            return check_type(key, *existing, hook_type, None);
        }
        if let Some(existing) = self.applied.read().await.get(key) {
            return check_type(key, *existing, hook_type, None);
        }
        let mut applied = self.applied.write().await;
        bind_key(&mut applied, key, hook_type, None)
    }

    /// Returns a snapshot of the handlers for `key` in execution order.
    pub async fn handlers(&self, key: &str) -> Vec<HookRecord> {
        let state = self.inner.read().await;
        state
            .records
            .get(key)
            .map(|records| order_records(records))
            .unwrap_or_default()
    }

    /// Returns the number of handlers registered for `key`.
    pub async fn handler_count(&self, key: &str) -> usize {
        let state = self.inner.read().await;
        state.records.get(key).map(Vec::len).unwrap_or(0)
    }

    /// Returns the type `key` is bound to, if any.
    pub async fn hook_type(&self, key: &str) -> Option<HookType> {
        if let Some(hook_type) = self.inner.read().await.key_types.get(key) {
            return Some(*hook_type);
        }
        self.applied.read().await.get(key).copied()
    }

    /// Returns every key that has at least one handler.
    pub async fn keys(&self) -> Vec<String> {
        let state = self.inner.read().await;
        let mut keys: Vec<String> = state.records.keys().cloned().collect();
        keys.sort();
        keys
    }
}

fn bind_key(
    key_types: &mut HashMap<String, HookType>,
    key: &str,
    hook_type: HookType,
    plugin_id: Option<&str>,
) -> Result<(), PluginError> {
    match key_types.get(key) {
        Some(existing) => check_type(key, *existing, hook_type, plugin_id),
        None => {
            key_types.insert(key.to_string(), hook_type);
            Ok(())
        }
    }
}

fn check_type(
    key: &str,
    existing: HookType,
    requested: HookType,
    plugin_id: Option<&str>,
) -> Result<(), PluginError> {
    if existing == requested {
        Ok(())
    } else {
        Err(PluginError::HookTypeConflict {
            key: key.to_string(),
            existing,
            requested,
            plugin_id: plugin_id.map(str::to_string),
        })
    }
}

/// Orders records for execution.
///
/// Registration order first, then a stable sort by stage, then each record
/// with `before: P` moves ahead of the first record of plugin `P` if that
/// record currently runs earlier.
fn order_records(records: &[HookRecord]) -> Vec<HookRecord> {
    let mut ordered = records.to_vec();
    ordered.sort_by_key(|record| (record.stage, record.seq));

    let movers: Vec<u64> = ordered
        .iter()
        .filter(|record| record.before.is_some())
        .map(|record| record.seq)
        .collect();

    for seq in movers {
        let Some(from) = ordered.iter().position(|record| record.seq == seq) else {
            continue;
        };
        let Some(target) = ordered[from].before.clone() else {
            continue;
        };
        let to = ordered
            .iter()
            .position(|record| record.plugin_id == target && record.seq != seq);
        if let Some(to) = to.filter(|to| *to < from) {
            let record = ordered.remove(from);
            ordered.insert(to, record);
        }
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::definitions::HookHandler;
    use serde_json::Value;

    fn modify_hook(key: &str) -> Hook {
        Hook::new(key, HookHandler::modify(|value: Value, _| async move { Ok(value) }))
    }

    fn event_hook(key: &str) -> Hook {
        Hook::new(key, HookHandler::event(|_| async { Ok(()) }))
    }

    fn plugin_order(records: &[HookRecord]) -> Vec<&str> {
        records.iter().map(|r| r.plugin_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_registration_order_preserved() {
        let table = HookTable::new();
        table.register("a", modify_hook("k")).await.unwrap();
        table.register("b", modify_hook("k")).await.unwrap();
        table.register("c", modify_hook("k")).await.unwrap();

        let handlers = table.handlers("k").await;
        assert_eq!(plugin_order(&handlers), vec!["a", "b", "c"]);
        assert_eq!(table.handler_count("k").await, 3);
    }

    #[tokio::test]
    async fn test_type_conflict_either_order() {
        let table = HookTable::new();
        table.register("a", modify_hook("k1")).await.unwrap();
        let err = table.register("b", event_hook("k1")).await.unwrap_err();
        assert!(matches!(
            err,
            PluginError::HookTypeConflict {
                existing: HookType::Modify,
                requested: HookType::Event,
                ..
            }
        ));

        table.register("a", event_hook("k2")).await.unwrap();
        let err = table.register("b", modify_hook("k2")).await.unwrap_err();
        assert!(matches!(
            err,
            PluginError::HookTypeConflict {
                existing: HookType::Event,
                requested: HookType::Modify,
                ..
            }
        ));
        assert_eq!(err.plugin_id(), Some("b"));
    }

    #[tokio::test]
    async fn test_claim_key_binds_type() {
        let table = HookTable::new();
        table.claim_key("unused", HookType::Add).await.unwrap();
        table.claim_key("unused", HookType::Add).await.unwrap();
        assert!(table.claim_key("unused", HookType::Modify).await.is_err());
        assert!(table.register("a", modify_hook("unused")).await.is_err());
    }

    #[tokio::test]
    async fn test_claim_key_leaves_handlers_untouched() {
        let table = HookTable::new();
        table.register("a", modify_hook("k")).await.unwrap();

        table.claim_key("k", HookType::Modify).await.unwrap();
        table.claim_key("fresh", HookType::Event).await.unwrap();

        assert_eq!(table.keys().await, vec!["k".to_string()]);
        assert_eq!(table.handler_count("fresh").await, 0);
        assert!(table.handlers("fresh").await.is_empty());
        assert_eq!(table.hook_type("fresh").await, Some(HookType::Event));
        assert_eq!(table.inner.read().await.key_types.len(), 1);
    }

    #[tokio::test]
    async fn test_stage_orders_within_key() {
        let table = HookTable::new();
        table.register("a", modify_hook("k")).await.unwrap();
        table
            .register("b", modify_hook("k").with_stage(-1))
            .await
            .unwrap();
        table
            .register("c", modify_hook("k").with_stage(1))
            .await
            .unwrap();
        table.register("d", modify_hook("k")).await.unwrap();

        let handlers = table.handlers("k").await;
        assert_eq!(plugin_order(&handlers), vec!["b", "a", "d", "c"]);
    }

    #[tokio::test]
    async fn test_before_moves_ahead_of_plugin() {
        let table = HookTable::new();
        table.register("a", modify_hook("k")).await.unwrap();
        table.register("b", modify_hook("k")).await.unwrap();
        table
            .register("c", modify_hook("k").before("b"))
            .await
            .unwrap();
        table
            .register("d", modify_hook("k").before("missing"))
            .await
            .unwrap();

        let handlers = table.handlers("k").await;
        assert_eq!(plugin_order(&handlers), vec!["a", "c", "b", "d"]);
    }
}
