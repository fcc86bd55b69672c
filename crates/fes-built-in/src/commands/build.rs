//! `build` command.

use serde_json::{Value, json};
use tracing::{error, info};

use fes_plugin::api::Command;
use fes_plugin::hooks::keys;
use fes_plugin::{ApplyPluginsCall, BoxError, PluginApi, PluginDescriptor, PluginKind};

use super::build_dev_utils::{BundleAndConfigs, clean_tmp_path_except_cache, get_bundle_and_configs};
use crate::bundler::BundlerCatalog;
use crate::error::BuildError;

pub const PLUGIN_ID: &str = "command:build";

/// Registers the `build` command.
pub fn plugin(bundlers: BundlerCatalog) -> PluginDescriptor {
    PluginDescriptor::from_fn(PLUGIN_ID, PluginKind::BuiltIn, move |api: PluginApi| {
        setup(api, bundlers.clone())
    })
}

async fn setup(api: PluginApi, bundlers: BundlerCatalog) -> Result<(), BoxError> {
    let command_api = api.clone();
    api.register_command(Command::new(
        "build",
        "Build the application for production",
        move |_args: Value| {
            let api = command_api.clone();
            let bundlers = bundlers.clone();
            async move { build(&api, &bundlers).await.map_err(BoxError::from) }
        },
    ))
    .await?;
    Ok(())
}

/// Cleans the temp directory, generates files, composes the bundle configs
/// and hands them to the bundler.
pub async fn build(api: &PluginApi, bundlers: &BundlerCatalog) -> Result<Value, BuildError> {
    let paths = api.paths().await;
    clean_tmp_path_except_cache(&paths.abs_tmp_path).await?;

    api.apply_plugins(ApplyPluginsCall::event(keys::ON_GENERATE_FILES))
        .await?;

    let BundleAndConfigs {
        bundler_id,
        bundler,
        bundle_configs,
        ..
    } = get_bundle_and_configs(api, bundlers, None).await?;

    info!(bundler = %bundler_id, configs = bundle_configs.len(), "Building");
    match bundler.build(&bundle_configs).await {
        Ok(stats) => {
            api.apply_plugins(
                ApplyPluginsCall::event(keys::ON_BUILD_COMPLETE)
                    .with_args(json!({ "stats": stats })),
            )
            .await?;
            info!("Build complete");
            Ok(stats)
        }
        Err(source) => {
            let complete = api
                .apply_plugins(
                    ApplyPluginsCall::event(keys::ON_BUILD_COMPLETE)
                        .with_args(json!({ "err": source.to_string() })),
                )
                .await;
            if let Err(e) = complete {
                error!(error = %e, "onBuildComplete failed after a build error");
            }
            Err(BuildError::Bundler {
                id: bundler_id,
                source,
            })
        }
    }
}
