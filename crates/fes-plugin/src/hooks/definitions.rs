//! Hook types, handlers, arguments and the well-known hook keys.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BoxError;

/// Well-known hook keys.
///
/// The names and the order in which the build command applies them are part
/// of the contract plugin authors rely on.
pub mod keys {
    /// modify: default path table → final path table.
    pub const MODIFY_PATHS: &str = "modifyPaths";
    /// modify: resolved configuration → configuration plugins read.
    pub const MODIFY_CONFIG: &str = "modifyConfig";
    /// event: every plugin finished its setup.
    pub const ON_PLUGIN_READY: &str = "onPluginReady";
    /// event: a command is about to run.
    pub const ON_START: &str = "onStart";

    /// modify: bundler id.
    pub const MODIFY_BUNDLER: &str = "modifyBundler";
    /// modify: bundler implementation handle, `null` by default.
    pub const MODIFY_BUNDLE_IMPLEMENTOR: &str = "modifyBundleImplementor";
    /// modify: options handed to the bundler's `getConfig`.
    pub const MODIFY_BUNDLE_CONFIG_OPTS: &str = "modifyBundleConfigOpts";
    /// modify: webpack-style chain, called back by the bundler.
    pub const CHAIN_WEBPACK: &str = "chainWebpack";
    /// modify: babel options, called back by the bundler.
    pub const MODIFY_BABEL_OPTS: &str = "modifyBabelOpts";
    /// modify: babel preset options, called back by the bundler.
    pub const MODIFY_BABEL_PRESET_OPTS: &str = "modifyBabelPresetOpts";
    /// modify: a single bundle config.
    pub const MODIFY_BUNDLE_CONFIG: &str = "modifyBundleConfig";
    /// modify: the final list of bundle configs.
    pub const MODIFY_BUNDLE_CONFIGS: &str = "modifyBundleConfigs";

    /// event: write generated files into the temp directory.
    pub const ON_GENERATE_FILES: &str = "onGenerateFiles";
    /// event: the build finished, successfully or not.
    pub const ON_BUILD_COMPLETE: &str = "onBuildComplete";

    /// add: imports placed before all others in the entry file.
    pub const ADD_ENTRY_IMPORTS_AHEAD: &str = "addEntryImportsAhead";
    /// add: imports in the entry file.
    pub const ADD_ENTRY_IMPORTS: &str = "addEntryImports";
    /// add: code placed before the entry body.
    pub const ADD_ENTRY_CODE_AHEAD: &str = "addEntryCodeAhead";
    /// add: code appended to the entry body.
    pub const ADD_ENTRY_CODE: &str = "addEntryCode";
}

/// Composition semantics of a hook key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookType {
    /// Left fold of a single value through every handler.
    Modify,
    /// Sequential notification; return values are discarded.
    Event,
    /// List accumulation of every handler's contribution.
    Add,
}

/// Alias matching the name plugin authors know from `api.ApplyPluginsType`.
pub type ApplyPluginsType = HookType;

impl HookType {
    /// Returns the string name of this hook type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modify => "modify",
            Self::Event => "event",
            Self::Add => "add",
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Arguments passed alongside the threaded value.
///
/// `data` is plain JSON. Extensions carry capabilities that are not data,
/// such as the `getConfig` function handed to `modifyBundleConfigs`.
#[derive(Clone, Default)]
pub struct HookArgs {
    /// JSON arguments.
    data: Value,
    /// Type-keyed shared capabilities.
    extensions: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl HookArgs {
    /// Creates arguments from a JSON value.
    pub fn new(data: Value) -> Self {
        Self {
            data,
            extensions: Arc::default(),
        }
    }

    /// Attaches a capability, replacing any previous one of the same type.
    pub fn with_extension<T: Any + Send + Sync>(mut self, value: Arc<T>) -> Self {
        Arc::make_mut(&mut self.extensions).insert(TypeId::of::<T>(), value);
        self
    }

    /// Looks up a capability by type.
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.extensions
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|ext| ext.downcast::<T>().ok())
    }

    /// The JSON arguments.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Gets a top-level JSON argument.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Gets a top-level string argument.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

impl From<Value> for HookArgs {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

impl fmt::Debug for HookArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookArgs")
            .field("data", &self.data)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

/// Future returned by every handler.
pub type HookFuture<T> = BoxFuture<'static, Result<T, BoxError>>;

/// `(value, args) -> next value`.
pub type ModifyFn = Arc<dyn Fn(Value, HookArgs) -> HookFuture<Value> + Send + Sync>;
/// `(args) -> ()`.
pub type EventFn = Arc<dyn Fn(HookArgs) -> HookFuture<()> + Send + Sync>;
/// `(memo, args) -> item or list of items`.
pub type AddFn = Arc<dyn Fn(Value, HookArgs) -> HookFuture<Value> + Send + Sync>;

/// A registered hook function. The variant is the hook's type.
#[derive(Clone)]
pub enum HookHandler {
    /// Value-threading handler.
    Modify(ModifyFn),
    /// Side-effecting handler.
    Event(EventFn),
    /// Item-contributing handler.
    Add(AddFn),
}

impl HookHandler {
    /// Wraps an async closure as a `modify` handler.
    pub fn modify<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self::Modify(Arc::new(
            move |value: Value, args: HookArgs| -> HookFuture<Value> { Box::pin(f(value, args)) },
        ))
    }

    /// Wraps an async closure as an `event` handler.
    pub fn event<F, Fut>(f: F) -> Self
    where
        F: Fn(HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self::Event(Arc::new(move |args: HookArgs| -> HookFuture<()> {
            Box::pin(f(args))
        }))
    }

    /// Wraps an async closure as an `add` handler.
    pub fn add<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self::Add(Arc::new(
            move |memo: Value, args: HookArgs| -> HookFuture<Value> { Box::pin(f(memo, args)) },
        ))
    }

    /// The composition type this handler participates in.
    pub fn hook_type(&self) -> HookType {
        match self {
            Self::Modify(_) => HookType::Modify,
            Self::Event(_) => HookType::Event,
            Self::Add(_) => HookType::Add,
        }
    }
}

impl fmt::Debug for HookHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookHandler::{}(<fn>)", self.hook_type())
    }
}

/// A hook registration request.
#[derive(Debug, Clone)]
pub struct Hook {
    /// Hook key.
    pub key: String,
    /// Handler; its variant fixes the hook type.
    pub handler: HookHandler,
    /// Secondary ordering within the key (lower runs first, default 0).
    pub stage: i32,
    /// Run ahead of the first handler registered by this plugin.
    pub before: Option<String>,
}

impl Hook {
    /// Creates a registration request with default ordering.
    pub fn new(key: impl Into<String>, handler: HookHandler) -> Self {
        Self {
            key: key.into(),
            handler,
            stage: 0,
            before: None,
        }
    }

    /// Sets the stage.
    pub fn with_stage(mut self, stage: i32) -> Self {
        self.stage = stage;
        self
    }

    /// Places this handler ahead of `plugin_id`'s handlers on the same key.
    pub fn before(mut self, plugin_id: impl Into<String>) -> Self {
        self.before = Some(plugin_id.into());
        self
    }
}

/// A hook handler as stored in the hook table.
#[derive(Debug, Clone)]
pub struct HookRecord {
    /// Hook key.
    pub key: String,
    /// Plugin that registered the handler.
    pub plugin_id: String,
    /// The handler.
    pub handler: HookHandler,
    /// Secondary ordering.
    pub stage: i32,
    /// Plugin this handler must precede.
    pub before: Option<String>,
    /// Global registration sequence number.
    pub seq: u64,
}

impl HookRecord {
    /// The composition type of this record.
    pub fn hook_type(&self) -> HookType {
        self.handler.hook_type()
    }
}
