//! Plugin registry: descriptors, enablement, and load ordering.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use fes_core::config::ConfigSchema;
use fes_core::types::Env;

use crate::api::PluginApi;
use crate::error::{BoxError, PluginError};

/// Where a plugin comes from. Built-ins always load before user plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    /// Shipped with the framework.
    BuiltIn,
    /// Third-party or project plugin.
    User,
}

/// What enablement predicates can look at.
#[derive(Debug, Clone, Copy)]
pub struct EnableContext<'a> {
    /// Target environment.
    pub env: Env,
    /// Configuration as written by the user, before defaults.
    pub user_config: &'a Value,
    /// Configuration after plugin defaults were merged in.
    pub config: &'a Value,
}

/// Predicate deciding whether a plugin takes part in a run.
pub type EnablePredicate = Arc<dyn Fn(&EnableContext<'_>) -> bool + Send + Sync>;

/// Enablement rule of a plugin.
#[derive(Clone, Default)]
pub enum EnableBy {
    /// Always enabled.
    #[default]
    Register,
    /// Enabled when the user config sets the plugin's config key to
    /// anything other than `false` or `null`.
    Config,
    /// Enabled when the predicate holds.
    Predicate(EnablePredicate),
}

impl EnableBy {
    /// Builds a predicate rule.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&EnableContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }
}

impl fmt::Debug for EnableBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register => write!(f, "Register"),
            Self::Config => write!(f, "Config"),
            Self::Predicate(_) => write!(f, "Predicate(<fn>)"),
        }
    }
}

/// A plugin's one-time setup function.
#[async_trait]
pub trait PluginApply: Send + Sync {
    /// Registers the plugin's hooks and commands through `api`.
    async fn apply(&self, api: PluginApi) -> Result<(), BoxError>;
}

/// Setup function backed by an async closure.
pub struct FnPlugin {
    f: Arc<dyn Fn(PluginApi) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>,
}

impl FnPlugin {
    /// Wraps `f`.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(PluginApi) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            f: Arc::new(
                move |api: PluginApi| -> BoxFuture<'static, Result<(), BoxError>> {
                    Box::pin(f(api))
                },
            ),
        }
    }
}

#[async_trait]
impl PluginApply for FnPlugin {
    async fn apply(&self, api: PluginApi) -> Result<(), BoxError> {
        (self.f)(api).await
    }
}

/// A config key a plugin owns, with its default.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig {
    /// Top-level key.
    pub key: String,
    /// Default value.
    pub default: Value,
}

/// Everything the host knows about a plugin before running it.
#[derive(Clone)]
pub struct PluginDescriptor {
    /// Unique id.
    pub id: String,
    /// Built-in or user.
    pub kind: PluginKind,
    /// Setup function.
    pub apply: Arc<dyn PluginApply>,
    /// Enablement rule.
    pub enable_by: EnableBy,
    /// Plugins this one must load before.
    pub before: Vec<String>,
    /// Plugins this one must load after.
    pub after: Vec<String>,
    /// Owned config key.
    pub config: Option<PluginConfig>,
}

impl PluginDescriptor {
    /// Creates a descriptor with default enablement and no constraints.
    pub fn new(id: impl Into<String>, kind: PluginKind, apply: impl PluginApply + 'static) -> Self {
        Self {
            id: id.into(),
            kind,
            apply: Arc::new(apply),
            enable_by: EnableBy::Register,
            before: Vec::new(),
            after: Vec::new(),
            config: None,
        }
    }

    /// Creates a descriptor whose setup is an async closure.
    pub fn from_fn<F, Fut>(id: impl Into<String>, kind: PluginKind, f: F) -> Self
    where
        F: Fn(PluginApi) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self::new(id, kind, FnPlugin::new(f))
    }

    /// Sets the enablement rule.
    pub fn enable_by(mut self, enable_by: EnableBy) -> Self {
        self.enable_by = enable_by;
        self
    }

    /// Requires this plugin to load before `plugin_id`.
    pub fn before(mut self, plugin_id: impl Into<String>) -> Self {
        self.before.push(plugin_id.into());
        self
    }

    /// Requires this plugin to load after `plugin_id`.
    pub fn after(mut self, plugin_id: impl Into<String>) -> Self {
        self.after.push(plugin_id.into());
        self
    }

    /// Declares a config key and its default.
    pub fn with_config(mut self, key: impl Into<String>, default: Value) -> Self {
        self.config = Some(PluginConfig {
            key: key.into(),
            default,
        });
        self
    }

    /// Evaluates the enablement rule.
    pub fn is_enabled(&self, ctx: &EnableContext<'_>) -> bool {
        match &self.enable_by {
            EnableBy::Register => true,
            EnableBy::Config => self
                .config
                .as_ref()
                .and_then(|config| ctx.user_config.get(&config.key))
                .is_some_and(|value| !matches!(value, Value::Bool(false) | Value::Null)),
            EnableBy::Predicate(predicate) => predicate(ctx),
        }
    }

    fn validate(&self) -> Result<(), PluginError> {
        let invalid = |reason: &str| PluginError::InvalidDescriptor {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if self.id.chars().any(char::is_whitespace) {
            return Err(invalid("id must not contain whitespace"));
        }
        if self.before.iter().chain(&self.after).any(|dep| *dep == self.id) {
            return Err(invalid("plugin cannot be ordered relative to itself"));
        }
        if matches!(self.enable_by, EnableBy::Config) && self.config.is_none() {
            return Err(invalid("enable_by config requires a config key"));
        }
        if self.config.as_ref().is_some_and(|c| c.key.trim().is_empty()) {
            return Err(invalid("config key must not be empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("enable_by", &self.enable_by)
            .field("before", &self.before)
            .field("after", &self.after)
            .field("config", &self.config)
            .finish()
    }
}

/// Registered descriptors, built-ins first.
#[derive(Debug, Default)]
struct Entries {
    built_in: Vec<PluginDescriptor>,
    user: Vec<PluginDescriptor>,
}

impl Entries {
    fn iter(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.built_in.iter().chain(&self.user)
    }
}

/// Registry of all known plugins.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    entries: RwLock<Entries>,
}

impl PluginRegistry {
    /// Creates a new empty plugin registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin after validating its descriptor.
    pub async fn register(&self, descriptor: PluginDescriptor) -> Result<(), PluginError> {
        descriptor.validate()?;

        let mut entries = self.entries.write().await;
        if entries.iter().any(|existing| existing.id == descriptor.id) {
            return Err(PluginError::DuplicateId { id: descriptor.id });
        }

        info!(plugin_id = %descriptor.id, kind = ?descriptor.kind, "Registering plugin");

        match descriptor.kind {
            PluginKind::BuiltIn => entries.built_in.push(descriptor),
            PluginKind::User => entries.user.push(descriptor),
        }
        Ok(())
    }

    /// Returns all descriptors, built-ins first, each group in registration order.
    pub async fn list(&self) -> Vec<PluginDescriptor> {
        let entries = self.entries.read().await;
        entries.iter().cloned().collect()
    }

    /// Gets a descriptor by id.
    pub async fn get(&self, plugin_id: &str) -> Option<PluginDescriptor> {
        let entries = self.entries.read().await;
        entries.iter().find(|p| p.id == plugin_id).cloned()
    }

    /// Checks whether a plugin is registered.
    pub async fn contains(&self, plugin_id: &str) -> bool {
        self.get(plugin_id).await.is_some()
    }

    /// Returns plugin count.
    pub async fn count(&self) -> usize {
        let entries = self.entries.read().await;
        entries.built_in.len() + entries.user.len()
    }

    /// Config keys declared by registered plugins, in load order.
    pub async fn config_schemas(&self) -> Vec<ConfigSchema> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter_map(|plugin| {
                plugin.config.as_ref().map(|config| ConfigSchema {
                    plugin_id: plugin.id.clone(),
                    key: config.key.clone(),
                    default: config.default.clone(),
                })
            })
            .collect()
    }

    /// Returns the plugins to activate, in load order.
    ///
    /// Disabled plugins are dropped first; constraints pointing at them are
    /// ignored. The rest are topologically sorted with ties broken by
    /// registration order, so without constraints the result is the
    /// registration order. Built-ins always precede user plugins, which makes
    /// a user plugin declared `before` a built-in a cycle.
    pub async fn resolve_enabled(
        &self,
        ctx: &EnableContext<'_>,
    ) -> Result<Vec<PluginDescriptor>, PluginError> {
        let all = self.list().await;
        let index: HashMap<&str, usize> = all
            .iter()
            .enumerate()
            .map(|(i, plugin)| (plugin.id.as_str(), i))
            .collect();

        for plugin in &all {
            for dependency in plugin.before.iter().chain(&plugin.after) {
                if !index.contains_key(dependency.as_str()) {
                    return Err(PluginError::UnknownDependency {
                        plugin_id: plugin.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        let enabled: Vec<bool> = all.iter().map(|plugin| plugin.is_enabled(ctx)).collect();
        for (plugin, on) in all.iter().zip(&enabled) {
            if !on {
                debug!(plugin_id = %plugin.id, "Plugin disabled for this run");
            }
        }

        let order = topo_sort(&all, &index, &enabled)?;
        let resolved: Vec<PluginDescriptor> = order.into_iter().map(|i| all[i].clone()).collect();

        info!(
            enabled = resolved.len(),
            registered = all.len(),
            "Plugin load order resolved"
        );
        Ok(resolved)
    }
}

/// Kahn's algorithm over the enabled plugins; `all` is in registration order
/// with built-ins first.
fn topo_sort(
    all: &[PluginDescriptor],
    index: &HashMap<&str, usize>,
    enabled: &[bool],
) -> Result<Vec<usize>, PluginError> {
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); all.len()];
    let mut in_degree = vec![0usize; all.len()];

    let mut add_edge = |from: usize, to: usize| -> Result<(), PluginError> {
        if all[from].kind == PluginKind::User && all[to].kind == PluginKind::BuiltIn {
            return Err(PluginError::CyclicDependency {
                plugins: vec![all[to].id.clone(), all[from].id.clone()],
            });
        }
        successors[from].push(to);
        in_degree[to] += 1;
        Ok(())
    };

    for (i, plugin) in all.iter().enumerate() {
        if !enabled[i] {
            continue;
        }
        for dependency in &plugin.after {
            let j = index[dependency.as_str()];
            if enabled[j] {
                add_edge(j, i)?;
            }
        }
        for dependent in &plugin.before {
            let j = index[dependent.as_str()];
            if enabled[j] {
                add_edge(i, j)?;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..all.len())
        .filter(|i| enabled[*i] && in_degree[*i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::new();

    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &next in &successors[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    let expected = enabled.iter().filter(|on| **on).count();
    if order.len() != expected {
        let plugins = (0..all.len())
            .filter(|i| enabled[*i] && in_degree[*i] > 0)
            .map(|i| all[i].id.clone())
            .collect();
        return Err(PluginError::CyclicDependency { plugins });
    }

    Ok(order)
}
