//! Shared steps of the build and dev commands.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::debug;

use fes_plugin::hooks::keys;
use fes_plugin::{ApplyPluginsCall, HookArgs, PluginApi};

use crate::bundler::{Bundler, BundlerCatalog, BundlerContext, BundlerHooks};
use crate::error::BuildError;

/// Temp directory entry that survives a clean.
pub const CACHE_DIR: &str = ".cache";

/// Name of the generated entry file inside the temp directory.
pub const ENTRY_FILE: &str = "fes.js";

/// Result of [`get_bundle_and_configs`].
pub struct BundleAndConfigs {
    /// Id of the selected bundler.
    pub bundler_id: String,
    /// Value composed by `modifyBundleImplementor`.
    pub bundle_implementor: Value,
    /// Bundler instance to build with.
    pub bundler: Arc<dyn Bundler>,
    /// Final bundle configs.
    pub bundle_configs: Vec<Value>,
}

impl fmt::Debug for BundleAndConfigs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleAndConfigs")
            .field("bundler_id", &self.bundler_id)
            .field("bundle_implementor", &self.bundle_implementor)
            .field("bundle_configs", &self.bundle_configs)
            .finish()
    }
}

/// Builds the config for one bundle type.
///
/// Handed to `modifyBundleConfigs` handlers as a [`HookArgs`] extension so
/// they can produce configs for additional types:
///
/// ```ignore
/// let get_config = args.extension::<GetConfig>().unwrap();
/// let ssr = get_config.get_config("ssr").await?;
/// ```
#[derive(Clone)]
pub struct GetConfig {
    api: PluginApi,
    bundler: Arc<dyn Bundler>,
    bundler_args: Map<String, Value>,
    bundle_implementor: Value,
    port: Option<u16>,
}

impl GetConfig {
    /// Runs `modifyBundleConfigOpts`, the bundler, then `modifyBundleConfig`.
    pub async fn get_config(&self, bundle_type: &str) -> Result<Value, BuildError> {
        let env = self.api.env();
        let paths = self.api.paths().await;
        let entry = paths.abs_tmp_path.join(ENTRY_FILE);

        let mut args = self.bundler_args.clone();
        args.insert("type".to_string(), json!(bundle_type));
        let args = Value::Object(args);

        let opts = self
            .api
            .apply_plugins(
                ApplyPluginsCall::modify(
                    keys::MODIFY_BUNDLE_CONFIG_OPTS,
                    json!({
                        "env": env.as_str(),
                        "type": bundle_type,
                        "port": self.port,
                        "hot": hot_reload_enabled(std::env::var("HMR").ok().as_deref()),
                        "entry": { "umi": entry },
                        "bundleImplementor": self.bundle_implementor,
                    }),
                )
                .with_args(args.clone()),
            )
            .await?;

        let hooks = BundlerHooks::new(self.api.clone());
        let config = self
            .bundler
            .get_config(opts, &hooks)
            .await
            .map_err(|source| BuildError::Bundler {
                id: bundler_id(&self.bundler_args),
                source,
            })?;

        let config = self
            .api
            .apply_plugins(ApplyPluginsCall::modify(keys::MODIFY_BUNDLE_CONFIG, config).with_args(args))
            .await?;

        debug!(bundle_type, "Bundle config composed");
        Ok(config)
    }
}

impl fmt::Debug for GetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetConfig")
            .field("plugin_id", &self.api.plugin_id())
            .field("bundler_args", &self.bundler_args)
            .field("port", &self.port)
            .finish()
    }
}

fn bundler_id(bundler_args: &Map<String, Value>) -> String {
    bundler_args
        .get("bundler")
        .and_then(|b| b.get("id"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Hot reload is on unless `HMR=none`.
fn hot_reload_enabled(hmr: Option<&str>) -> bool {
    hmr != Some("none")
}

/// Resolves the bundler and composes the final list of bundle configs.
///
/// The `applyPlugins` calls happen in a fixed order: `modifyBundler`,
/// `modifyBundleImplementor`, then per config `modifyBundleConfigOpts`, the
/// bundler's own hooks and `modifyBundleConfig`, and last
/// `modifyBundleConfigs`.
pub async fn get_bundle_and_configs(
    api: &PluginApi,
    bundlers: &BundlerCatalog,
    port: Option<u16>,
) -> Result<BundleAndConfigs, BuildError> {
    let bundler_id = api
        .apply_plugins(ApplyPluginsCall::modify(
            keys::MODIFY_BUNDLER,
            json!(crate::bundler::DEFAULT_BUNDLER_ID),
        ))
        .await?;
    let bundler_id = match bundler_id {
        Value::String(id) => id,
        value => return Err(BuildError::InvalidBundler { value }),
    };
    let factory = bundlers.get(&bundler_id)?;

    let bundle_implementor = api
        .apply_plugins(ApplyPluginsCall::modify(
            keys::MODIFY_BUNDLE_IMPLEMENTOR,
            Value::Null,
        ))
        .await?;

    let bundler = factory
        .create(BundlerContext {
            cwd: api.cwd().to_path_buf(),
            env: api.env(),
            config: api.config().await,
            paths: api.paths().await,
        })
        .map_err(|source| BuildError::Bundler {
            id: bundler_id.clone(),
            source,
        })?;

    let mut bundler_args = Map::new();
    bundler_args.insert("env".to_string(), json!(api.env().as_str()));
    bundler_args.insert(
        "bundler".to_string(),
        json!({ "id": factory.id(), "version": factory.version() }),
    );

    let get_config = Arc::new(GetConfig {
        api: api.clone(),
        bundler: bundler.clone(),
        bundler_args: bundler_args.clone(),
        bundle_implementor: bundle_implementor.clone(),
        port,
    });

    let csr = get_config.get_config("csr").await?;
    let initial: Vec<Value> = [csr].into_iter().filter(|c| !c.is_null()).collect();

    let args = HookArgs::new(Value::Object(bundler_args)).with_extension(get_config);
    let bundle_configs = api
        .apply_plugins(
            ApplyPluginsCall::modify(keys::MODIFY_BUNDLE_CONFIGS, Value::Array(initial))
                .with_args(args),
        )
        .await?;

    let bundle_configs = match bundle_configs {
        Value::Array(configs) => configs.into_iter().filter(|c| !c.is_null()).collect(),
        Value::Null => Vec::new(),
        single => vec![single],
    };

    Ok(BundleAndConfigs {
        bundler_id,
        bundle_implementor,
        bundler,
        bundle_configs,
    })
}

/// Empties the temp directory except for its `.cache` entry. A missing
/// directory is left alone.
pub async fn clean_tmp_path_except_cache(abs_tmp_path: &Path) -> Result<(), BuildError> {
    let mut entries = match tokio::fs::read_dir(abs_tmp_path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(BuildError::io(abs_tmp_path, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BuildError::io(abs_tmp_path, e))?
    {
        if entry.file_name() == CACHE_DIR {
            continue;
        }

        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| BuildError::io(&path, e))?;
        let removed = if file_type.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        removed.map_err(|e| BuildError::io(&path, e))?;
        debug!(path = %path.display(), "Removed temp entry");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clean_keeps_cache() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join(".fes");
        std::fs::create_dir_all(tmp.join(".cache/babel")).unwrap();
        std::fs::create_dir_all(tmp.join("core")).unwrap();
        std::fs::write(tmp.join("fes.js"), "old").unwrap();
        std::fs::write(tmp.join("core/plugin.js"), "old").unwrap();

        clean_tmp_path_except_cache(&tmp).await.unwrap();

        let mut left: Vec<String> = std::fs::read_dir(&tmp)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec![CACHE_DIR]);
        assert!(tmp.join(".cache/babel").is_dir());
    }

    #[test]
    fn test_hot_reload_follows_hmr() {
        assert!(hot_reload_enabled(None));
        assert!(hot_reload_enabled(Some("")));
        assert!(hot_reload_enabled(Some("true")));
        assert!(!hot_reload_enabled(Some("none")));
    }

    #[tokio::test]
    async fn test_clean_missing_dir_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        clean_tmp_path_except_cache(&dir.path().join("absent"))
            .await
            .unwrap();
    }
}
