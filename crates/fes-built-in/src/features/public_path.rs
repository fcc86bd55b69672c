//! `public_path`: URL prefix of emitted assets.

use fes_plugin::prelude::*;

use super::object_entry;

pub const PLUGIN_ID: &str = "features:publicPath";
pub const CONFIG_KEY: &str = "public_path";

pub fn plugin() -> PluginDescriptor {
    PluginDescriptor::from_fn(PLUGIN_ID, PluginKind::BuiltIn, setup).with_config(CONFIG_KEY, json!("/"))
}

async fn setup(api: PluginApi) -> Result<(), BoxError> {
    let hook_api = api.clone();
    api.modify(keys::MODIFY_BUNDLE_CONFIG, move |mut config: Value, _args: HookArgs| {
        let api = hook_api.clone();
        async move {
            let public_path = api
                .config()
                .await
                .get(CONFIG_KEY)
                .cloned()
                .unwrap_or_else(|| json!("/"));
            if let Some(output) = object_entry(&mut config, "output") {
                output.insert("publicPath".to_string(), public_path);
            }
            Ok(config)
        }
    })
    .await?;
    Ok(())
}
