//! `output_path`: where the bundle is written, relative to the project root.

use fes_plugin::prelude::*;

pub const PLUGIN_ID: &str = "features:outputPath";
pub const CONFIG_KEY: &str = "output_path";
const DEFAULT_OUTPUT_PATH: &str = "dist";

pub fn plugin() -> PluginDescriptor {
    PluginDescriptor::from_fn(PLUGIN_ID, PluginKind::BuiltIn, setup)
        .with_config(CONFIG_KEY, json!(DEFAULT_OUTPUT_PATH))
}

async fn setup(api: PluginApi) -> Result<(), BoxError> {
    let hook_api = api.clone();
    api.modify(keys::MODIFY_PATHS, move |mut paths: Value, _args: HookArgs| {
        let api = hook_api.clone();
        async move {
            let config = api.config().await;
            let output_path = config
                .get(CONFIG_KEY)
                .and_then(Value::as_str)
                .filter(|p| !p.is_empty())
                .unwrap_or(DEFAULT_OUTPUT_PATH);

            let abs_output_path = api.cwd().join(output_path);
            if let Some(map) = paths.as_object_mut() {
                map.insert("absOutputPath".to_string(), json!(abs_output_path));
            }
            Ok(paths)
        }
    })
    .await?;
    Ok(())
}
