//! Bundler contract and the default webpack-shaped backend.
//!
//! The host never bundles anything itself. A [`BundlerFactory`] is picked by
//! id through the `modifyBundler` hook, instantiated per build, and asked to
//! turn the composed options into a bundle config and finally to build.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use fes_core::types::{Env, Paths};
use fes_plugin::hooks::keys;
use fes_plugin::{ApplyPluginsCall, BoxError, PluginApi, PluginError};

use crate::error::BuildError;

/// Id of the bundler used when no plugin overrides `modifyBundler`.
pub const DEFAULT_BUNDLER_ID: &str = "webpack";

/// File the default bundler writes its configs to, under the output path.
pub const BUNDLE_CONFIGS_FILE: &str = "bundle-configs.json";

/// What a bundler is created with.
#[derive(Debug, Clone)]
pub struct BundlerContext {
    /// Project root.
    pub cwd: PathBuf,
    /// Target environment.
    pub env: Env,
    /// Resolved configuration.
    pub config: Arc<Value>,
    /// Path table after `modifyPaths`.
    pub paths: Arc<Paths>,
}

/// Creates bundler instances. One factory per bundler id.
pub trait BundlerFactory: Send + Sync {
    /// Catalog id, e.g. `webpack`.
    fn id(&self) -> &str;

    /// Backend version reported to hooks.
    fn version(&self) -> &str;

    /// Instantiates the bundler for one build.
    fn create(&self, ctx: BundlerContext) -> Result<Arc<dyn Bundler>, BoxError>;
}

/// One bundler instance.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Turns composed options into a bundle config. The bundler may run the
    /// babel and chain hooks through `hooks`.
    async fn get_config(&self, opts: Value, hooks: &BundlerHooks) -> Result<Value, BoxError>;

    /// Builds every config and returns the build stats.
    async fn build(&self, configs: &[Value]) -> Result<Value, BoxError>;
}

/// Hook callbacks a bundler may invoke while producing its config.
#[derive(Debug, Clone)]
pub struct BundlerHooks {
    api: PluginApi,
}

impl BundlerHooks {
    pub(crate) fn new(api: PluginApi) -> Self {
        Self { api }
    }

    /// Runs `modifyBabelOpts`.
    pub async fn modify_babel_opts(&self, opts: Value) -> Result<Value, PluginError> {
        self.api
            .apply_plugins(ApplyPluginsCall::modify(keys::MODIFY_BABEL_OPTS, opts))
            .await
    }

    /// Runs `modifyBabelPresetOpts`.
    pub async fn modify_babel_preset_opts(&self, opts: Value) -> Result<Value, PluginError> {
        self.api
            .apply_plugins(ApplyPluginsCall::modify(keys::MODIFY_BABEL_PRESET_OPTS, opts))
            .await
    }

    /// Runs `chainWebpack` over a webpack-shaped config.
    pub async fn chain_webpack(&self, config: Value, args: Value) -> Result<Value, PluginError> {
        self.api
            .apply_plugins(ApplyPluginsCall::modify(keys::CHAIN_WEBPACK, config).with_args(args))
            .await
    }
}

/// Bundler factories by id.
#[derive(Clone)]
pub struct BundlerCatalog {
    factories: HashMap<String, Arc<dyn BundlerFactory>>,
}

impl BundlerCatalog {
    /// Catalog without any bundler.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Adds a factory, replacing one with the same id.
    pub fn with(mut self, factory: Arc<dyn BundlerFactory>) -> Self {
        self.factories.insert(factory.id().to_string(), factory);
        self
    }

    /// Looks a factory up by id.
    pub fn get(&self, id: &str) -> Result<Arc<dyn BundlerFactory>, BuildError> {
        self.factories
            .get(id)
            .cloned()
            .ok_or_else(|| BuildError::UnknownBundler { id: id.to_string() })
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for BundlerCatalog {
    fn default() -> Self {
        Self::empty().with(Arc::new(DefaultBundlerFactory))
    }
}

impl fmt::Debug for BundlerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundlerCatalog")
            .field("ids", &self.ids())
            .finish()
    }
}

/// Factory for [`DefaultBundler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBundlerFactory;

impl BundlerFactory for DefaultBundlerFactory {
    fn id(&self) -> &str {
        DEFAULT_BUNDLER_ID
    }

    fn version(&self) -> &str {
        "5"
    }

    fn create(&self, ctx: BundlerContext) -> Result<Arc<dyn Bundler>, BoxError> {
        Ok(Arc::new(DefaultBundler { ctx }))
    }
}

/// Produces plain webpack-shaped JSON configs and "builds" them by writing
/// the configs to [`BUNDLE_CONFIGS_FILE`] in the output directory.
#[derive(Debug)]
pub struct DefaultBundler {
    ctx: BundlerContext,
}

#[async_trait]
impl Bundler for DefaultBundler {
    async fn get_config(&self, opts: Value, hooks: &BundlerHooks) -> Result<Value, BoxError> {
        let env = opts
            .get("env")
            .and_then(Value::as_str)
            .unwrap_or(self.ctx.env.as_str())
            .to_string();
        let is_production = env == Env::Production.as_str();

        let preset_opts = hooks
            .modify_babel_preset_opts(json!({
                "env": { "useBuiltIns": "entry", "corejs": 3, "modules": false },
                "typescript": true,
            }))
            .await?;
        let babel_opts = hooks
            .modify_babel_opts(json!({
                "presets": [["@babel/preset-env", preset_opts]],
                "plugins": [],
                "cacheDirectory": !is_production,
            }))
            .await?;

        let filename = if is_production {
            "[name].[contenthash:8].js"
        } else {
            "[name].js"
        };
        let devtool = if is_production {
            Value::Bool(false)
        } else {
            json!("cheap-module-source-map")
        };

        let config = json!({
            "mode": env,
            "target": "web",
            "entry": opts.get("entry").cloned().unwrap_or_else(|| json!({})),
            "output": {
                "path": self.ctx.paths.abs_output_path,
                "publicPath": "/",
                "filename": filename,
            },
            "resolve": {
                "extensions": [".mjs", ".js", ".jsx", ".ts", ".tsx", ".vue", ".json"],
                "alias": {},
            },
            "module": {
                "rules": [{
                    "test": "\\.(js|mjs|jsx|ts|tsx)$",
                    "loader": "babel-loader",
                    "options": babel_opts,
                }],
            },
            "devtool": devtool,
            "define": {},
            "plugins": [],
        });

        let args = json!({ "env": env, "type": opts.get("type").cloned().unwrap_or(Value::Null) });
        Ok(hooks.chain_webpack(config, args).await?)
    }

    async fn build(&self, configs: &[Value]) -> Result<Value, BoxError> {
        let output_path = &self.ctx.paths.abs_output_path;
        tokio::fs::create_dir_all(output_path)
            .await
            .map_err(|e| BuildError::io(output_path, e))?;

        let target = output_path.join(BUNDLE_CONFIGS_FILE);
        let contents = serde_json::to_vec_pretty(configs)?;
        tokio::fs::write(&target, contents)
            .await
            .map_err(|e| BuildError::io(&target, e))?;

        info!(path = %target.display(), configs = configs.len(), "Bundle configs written");
        Ok(json!({
            "outputPath": output_path,
            "configs": configs.len(),
            "assets": [BUNDLE_CONFIGS_FILE],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_has_webpack() {
        let catalog = BundlerCatalog::default();
        assert_eq!(catalog.ids(), vec![DEFAULT_BUNDLER_ID]);
        let factory = catalog.get(DEFAULT_BUNDLER_ID).unwrap();
        assert_eq!(factory.version(), "5");
    }

    #[test]
    fn test_unknown_bundler() {
        let err = BundlerCatalog::default().get("vite").err().unwrap();
        assert!(matches!(err, BuildError::UnknownBundler { id } if id == "vite"));
    }

    #[tokio::test]
    async fn test_default_build_writes_configs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::resolve(dir.path(), Env::Production);
        let bundler = DefaultBundlerFactory
            .create(BundlerContext {
                cwd: dir.path().to_path_buf(),
                env: Env::Production,
                config: Arc::new(json!({})),
                paths: Arc::new(paths.clone()),
            })
            .unwrap();

        let stats = bundler.build(&[json!({ "mode": "production" })]).await.unwrap();
        assert_eq!(stats["configs"], json!(1));

        let written = std::fs::read_to_string(paths.abs_output_path.join(BUNDLE_CONFIGS_FILE)).unwrap();
        let parsed: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, json!([{ "mode": "production" }]));
    }
}
