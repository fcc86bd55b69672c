//! Plugin API: host state and hook registration, scoped to one plugin.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use fes_core::types::{Env, Paths};

use super::command::{Command, CommandRecord};
use crate::error::{BoxError, PluginError};
use crate::hooks::definitions::{Hook, HookArgs, HookHandler};
use crate::hooks::dispatcher::ApplyPluginsCall;
use crate::service::ServiceShared;

/// Handle passed to a plugin's setup function.
///
/// Reads are snapshots of service state; every hook or command registered
/// through the handle is tagged with the owning plugin's id. Cloning is
/// cheap, so commands and handlers can keep their own copy.
#[derive(Clone)]
pub struct PluginApi {
    /// Owning plugin.
    plugin_id: Arc<str>,
    /// Service state.
    shared: Arc<ServiceShared>,
}

impl PluginApi {
    pub(crate) fn new(plugin_id: &str, shared: Arc<ServiceShared>) -> Self {
        Self {
            plugin_id: Arc::from(plugin_id),
            shared,
        }
    }

    /// Id of the plugin this handle belongs to.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Project root.
    pub fn cwd(&self) -> &Path {
        &self.shared.cwd
    }

    /// Target environment.
    pub fn env(&self) -> Env {
        self.shared.env
    }

    /// Configuration as written by the user.
    pub fn user_config(&self) -> Arc<Value> {
        self.shared.user_config.clone()
    }

    /// Resolved configuration (user config merged with plugin defaults,
    /// then `modifyConfig` once plugins are ready).
    pub async fn config(&self) -> Arc<Value> {
        self.shared.config.read().await.clone()
    }

    /// Path table.
    pub async fn paths(&self) -> Arc<Paths> {
        self.shared.paths.read().await.clone()
    }

    /// Returns whether every listed plugin is enabled for this run.
    pub async fn has_plugins(&self, plugin_ids: &[&str]) -> bool {
        let enabled = self.shared.enabled.read().await;
        plugin_ids
            .iter()
            .all(|id| enabled.iter().any(|enabled_id| enabled_id == id))
    }

    /// Registers a hook handler.
    pub async fn register_hook(&self, hook: Hook) -> Result<(), PluginError> {
        let phase = self.shared.phase().await;
        if !phase.accepts_registration() {
            return Err(PluginError::LateRegistration {
                plugin_id: self.plugin_id.to_string(),
                key: hook.key,
                phase,
            });
        }
        self.shared
            .dispatcher
            .table()
            .register(&self.plugin_id, hook)
            .await
    }

    /// Registers a `modify` handler for `key`.
    pub async fn modify<F, Fut>(&self, key: &str, f: F) -> Result<(), PluginError>
    where
        F: Fn(Value, HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        self.register_hook(Hook::new(key, HookHandler::modify(f)))
            .await
    }

    /// Registers an `event` handler for `key`.
    pub async fn on_event<F, Fut>(&self, key: &str, f: F) -> Result<(), PluginError>
    where
        F: Fn(HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.register_hook(Hook::new(key, HookHandler::event(f)))
            .await
    }

    /// Registers an `add` handler for `key`.
    pub async fn add<F, Fut>(&self, key: &str, f: F) -> Result<(), PluginError>
    where
        F: Fn(Value, HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        self.register_hook(Hook::new(key, HookHandler::add(f))).await
    }

    /// Registers a command.
    pub async fn register_command(&self, command: Command) -> Result<(), PluginError> {
        let phase = self.shared.phase().await;
        if !phase.accepts_registration() {
            return Err(PluginError::LateRegistration {
                plugin_id: self.plugin_id.to_string(),
                key: command.name,
                phase,
            });
        }

        let mut commands = self.shared.commands.write().await;
        if let Some(existing) = commands.get(&command.name) {
            return Err(PluginError::DuplicateCommand {
                name: command.name,
                plugin_id: self.plugin_id.to_string(),
                existing: existing.plugin_id.clone(),
            });
        }

        debug!(command = %command.name, plugin_id = %self.plugin_id, "Command registered");
        commands.insert(
            command.name.clone(),
            CommandRecord {
                command,
                plugin_id: self.plugin_id.to_string(),
            },
        );
        Ok(())
    }

    /// Runs an `applyPlugins` pipeline. Only allowed once every plugin has
    /// finished its setup.
    pub async fn apply_plugins(&self, call: ApplyPluginsCall) -> Result<Value, PluginError> {
        self.shared.apply_plugins(call).await
    }
}

impl fmt::Debug for PluginApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginApi")
            .field("plugin_id", &self.plugin_id)
            .field("cwd", &self.shared.cwd)
            .field("env", &self.shared.env)
            .finish()
    }
}
