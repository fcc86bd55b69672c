//! Service that owns one run, covering configuration, plugin loading, and commands.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{error, info};

use fes_core::config::{ConfigResolver, StaticConfig};
use fes_core::error::{ErrorKind, FesError};
use fes_core::types::{Env, Paths};

use crate::api::PluginApi;
use crate::api::command::CommandRecord;
use crate::catalog::PluginCatalog;
use crate::error::PluginError;
use crate::hooks::definitions::keys;
use crate::hooks::dispatcher::{ApplyPluginsCall, HookDispatcher};
use crate::hooks::registry::HookTable;
use crate::lifecycle::ServicePhase;
use crate::registry::{EnableContext, PluginDescriptor, PluginRegistry};

/// Inputs for constructing a [`Service`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Project root.
    pub cwd: PathBuf,
    /// Target environment.
    pub env: Env,
    /// Raw user configuration document.
    pub user_config: Value,
}

impl ServiceOptions {
    /// Options with an empty user configuration.
    pub fn new(cwd: impl Into<PathBuf>, env: Env) -> Self {
        Self {
            cwd: cwd.into(),
            env,
            user_config: json!({}),
        }
    }

    /// Options from a loaded project configuration.
    pub fn from_static_config(cwd: impl Into<PathBuf>, env: Env, config: StaticConfig) -> Self {
        Self {
            cwd: cwd.into(),
            env,
            user_config: config.raw,
        }
    }

    /// Sets the raw user configuration.
    pub fn with_user_config(mut self, user_config: Value) -> Self {
        self.user_config = user_config;
        self
    }
}

/// State shared between the service and every [`PluginApi`].
#[derive(Debug)]
pub(crate) struct ServiceShared {
    pub(crate) cwd: PathBuf,
    pub(crate) env: Env,
    pub(crate) user_config: Arc<Value>,
    pub(crate) phase: RwLock<ServicePhase>,
    pub(crate) config: RwLock<Arc<Value>>,
    pub(crate) paths: RwLock<Arc<Paths>>,
    pub(crate) enabled: RwLock<Vec<String>>,
    pub(crate) commands: RwLock<HashMap<String, CommandRecord>>,
    pub(crate) dispatcher: HookDispatcher,
}

impl ServiceShared {
    pub(crate) async fn phase(&self) -> ServicePhase {
        *self.phase.read().await
    }

    pub(crate) async fn transition(&self, to: ServicePhase) -> Result<(), PluginError> {
        let mut phase = self.phase.write().await;
        if !phase.can_transition_to(to) {
            return Err(PluginError::InvalidTransition { from: *phase, to });
        }
        info!(from = %*phase, to = %to, "Service phase changed");
        *phase = to;
        Ok(())
    }

    /// Moves to `Done` from wherever the service is.
    pub(crate) async fn abort(&self) {
        let mut phase = self.phase.write().await;
        if *phase != ServicePhase::Done {
            info!(from = %*phase, "Service finished");
            *phase = ServicePhase::Done;
        }
    }

    pub(crate) async fn apply_plugins(&self, call: ApplyPluginsCall) -> Result<Value, PluginError> {
        let phase = self.phase().await;
        if !phase.accepts_apply() {
            return Err(PluginError::LifecycleViolation {
                operation: "apply plugins",
                phase,
            });
        }
        self.dispatcher.apply(call).await
    }
}

/// One command invocation's worth of plugin host state.
#[derive(Debug)]
pub struct Service {
    /// Plugin registry.
    registry: Arc<PluginRegistry>,
    /// Shared state handed to plugins.
    shared: Arc<ServiceShared>,
}

impl Service {
    /// Creates a service in the `Created` phase.
    pub fn new(options: ServiceOptions) -> Self {
        let paths = Paths::resolve(&options.cwd, options.env);
        let table = Arc::new(HookTable::new());

        Self {
            registry: Arc::new(PluginRegistry::new()),
            shared: Arc::new(ServiceShared {
                cwd: options.cwd,
                env: options.env,
                user_config: Arc::new(options.user_config),
                phase: RwLock::new(ServicePhase::Created),
                config: RwLock::new(Arc::new(Value::Null)),
                paths: RwLock::new(Arc::new(paths)),
                enabled: RwLock::new(Vec::new()),
                commands: RwLock::new(HashMap::new()),
                dispatcher: HookDispatcher::new(table),
            }),
        }
    }

    /// Registers a plugin. Only allowed before [`init`](Self::init).
    pub async fn register_plugin(&self, descriptor: PluginDescriptor) -> Result<(), PluginError> {
        let phase = self.shared.phase().await;
        if phase != ServicePhase::Created {
            return Err(PluginError::LifecycleViolation {
                operation: "register plugins",
                phase,
            });
        }
        self.registry.register(descriptor).await
    }

    /// Registers several plugins in order.
    pub async fn register_plugins(
        &self,
        descriptors: impl IntoIterator<Item = PluginDescriptor>,
    ) -> Result<(), PluginError> {
        for descriptor in descriptors {
            self.register_plugin(descriptor).await?;
        }
        Ok(())
    }

    /// Registers the catalog plugins listed under `plugins` in the user
    /// configuration, in the listed order.
    pub async fn register_from_catalog(&self, catalog: &PluginCatalog) -> Result<(), PluginError> {
        let ids = match self.shared.user_config.get("plugins") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        FesError::validation(format!("Plugin ids must be strings, got {item}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(FesError::validation(format!(
                    "'plugins' must be a list of plugin ids, got {other}"
                ))
                .into());
            }
        };

        let descriptors = catalog.select(&ids)?;
        self.register_plugins(descriptors).await
    }

    /// Resolves configuration, loads every enabled plugin, and applies the
    /// `modifyPaths`, `modifyConfig` and `onPluginReady` hooks.
    ///
    /// Any failure is fatal: the service moves to `Done` and the error is
    /// returned with the offending plugin attached. Calling it outside
    /// `Created` is rejected and leaves the service as it was.
    pub async fn init(&self) -> Result<(), PluginError> {
        let phase = self.shared.phase().await;
        if phase != ServicePhase::Created {
            return Err(PluginError::LifecycleViolation {
                operation: "initialize service",
                phase,
            });
        }

        let result = self.load().await;
        if let Err(e) = &result {
            error!(
                plugin_id = e.plugin_id().unwrap_or("-"),
                error = %e,
                "Service initialization failed"
            );
            self.shared.abort().await;
        }
        result
    }

    async fn load(&self) -> Result<(), PluginError> {
        let schemas = self.registry.config_schemas().await;
        let resolved = ConfigResolver::new(&schemas).resolve(&self.shared.user_config)?;
        self.shared.transition(ServicePhase::ConfigResolved).await?;
        *self.shared.config.write().await = Arc::new(resolved.clone());

        let ctx = EnableContext {
            env: self.shared.env,
            user_config: &self.shared.user_config,
            config: &resolved,
        };
        let plugins = self.registry.resolve_enabled(&ctx).await?;
        *self.shared.enabled.write().await = plugins.iter().map(|p| p.id.clone()).collect();

        self.shared.transition(ServicePhase::PluginsLoading).await?;
        for plugin in &plugins {
            let api = PluginApi::new(&plugin.id, self.shared.clone());
            plugin
                .apply
                .apply(api)
                .await
                .map_err(|source| PluginError::PluginApply {
                    plugin_id: plugin.id.clone(),
                    source,
                })?;
            info!(plugin_id = %plugin.id, "Plugin applied");
        }
        self.shared.transition(ServicePhase::PluginsReady).await?;

        let default_paths = serde_json::to_value(&*self.paths().await).map_err(FesError::from)?;
        let paths = self
            .shared
            .apply_plugins(ApplyPluginsCall::modify(keys::MODIFY_PATHS, default_paths))
            .await?;
        let paths: Paths = serde_json::from_value(paths).map_err(|e| {
            FesError::with_source(
                ErrorKind::Validation,
                "modifyPaths returned an invalid path table",
                e,
            )
        })?;
        *self.shared.paths.write().await = Arc::new(paths);

        let config = self
            .shared
            .apply_plugins(ApplyPluginsCall::modify(keys::MODIFY_CONFIG, resolved))
            .await?;
        *self.shared.config.write().await = Arc::new(config);

        self.shared
            .apply_plugins(ApplyPluginsCall::event(keys::ON_PLUGIN_READY))
            .await?;

        info!(plugins = plugins.len(), "Plugins ready");
        Ok(())
    }

    /// Runs a registered command, then finishes the service.
    pub async fn run_command(&self, name: &str, args: Value) -> Result<Value, PluginError> {
        self.shared.transition(ServicePhase::Running).await?;
        let result = self.execute(name, args).await;
        if let Err(e) = &result {
            error!(command = %name, error = %e, "Command failed");
        }
        self.shared.abort().await;
        result
    }

    async fn execute(&self, name: &str, args: Value) -> Result<Value, PluginError> {
        let record = self
            .shared
            .commands
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::CommandNotFound {
                name: name.to_string(),
            })?;

        self.shared
            .apply_plugins(
                ApplyPluginsCall::event(keys::ON_START)
                    .with_args(json!({ "name": name, "args": args.clone() })),
            )
            .await?;

        info!(command = %name, plugin_id = %record.plugin_id, "Running command");
        (record.command.handler)(args)
            .await
            .map_err(|source| PluginError::Command {
                name: name.to_string(),
                plugin_id: record.plugin_id.clone(),
                source,
            })
    }

    /// Runs an `applyPlugins` call on behalf of the command layer.
    pub async fn apply_plugins(&self, call: ApplyPluginsCall) -> Result<Value, PluginError> {
        self.shared.apply_plugins(call).await
    }

    /// Ends the run without running a command.
    pub async fn finish(&self) {
        self.shared.abort().await;
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> ServicePhase {
        self.shared.phase().await
    }

    /// Current configuration snapshot.
    pub async fn config(&self) -> Arc<Value> {
        self.shared.config.read().await.clone()
    }

    /// Current path table snapshot.
    pub async fn paths(&self) -> Arc<Paths> {
        self.shared.paths.read().await.clone()
    }

    /// Ids of the plugins enabled for this run, in load order.
    pub async fn enabled_plugins(&self) -> Vec<String> {
        self.shared.enabled.read().await.clone()
    }

    /// Registered commands as `(name, description)`, sorted by name.
    pub async fn commands(&self) -> Vec<(String, String)> {
        let commands = self.shared.commands.read().await;
        let mut list: Vec<(String, String)> = commands
            .values()
            .map(|r| (r.command.name.clone(), r.command.description.clone()))
            .collect();
        list.sort();
        list
    }

    /// Returns the plugin registry.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Returns the hook table.
    pub fn hooks(&self) -> &Arc<HookTable> {
        self.shared.dispatcher.table()
    }

    /// Project root.
    pub fn cwd(&self) -> &std::path::Path {
        &self.shared.cwd
    }

    /// Target environment.
    pub fn env(&self) -> Env {
        self.shared.env
    }
}
