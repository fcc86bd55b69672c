//! `dev_server`: fills the dev server section of the bundler options.

use fes_plugin::prelude::*;

pub const PLUGIN_ID: &str = "features:devServer";
pub const CONFIG_KEY: &str = "dev_server";

pub fn plugin() -> PluginDescriptor {
    PluginDescriptor::from_fn(PLUGIN_ID, PluginKind::BuiltIn, setup).with_config(CONFIG_KEY, json!({}))
}

async fn setup(api: PluginApi) -> Result<(), BoxError> {
    let hook_api = api.clone();
    api.modify(keys::MODIFY_BUNDLE_CONFIG_OPTS, move |mut opts: Value, _args: HookArgs| {
        let api = hook_api.clone();
        async move {
            let config = api.config().await;
            let dev_server = config.get(CONFIG_KEY).cloned().unwrap_or_else(|| json!({}));
            apply_dev_server(&mut opts, dev_server);
            Ok(opts)
        }
    })
    .await?;
    Ok(())
}

/// An explicit `port` in the options wins over the configured one.
fn apply_dev_server(opts: &mut Value, mut dev_server: Value) {
    let Some(map) = opts.as_object_mut() else {
        return;
    };

    if map.get("port").is_none_or(Value::is_null) {
        if let Some(port) = dev_server.get("port").filter(|p| !p.is_null()) {
            map.insert("port".to_string(), port.clone());
        }
    }
    if let Some(section) = dev_server.as_object_mut() {
        section.insert("port".to_string(), map.get("port").cloned().unwrap_or(Value::Null));
        section.insert("hot".to_string(), map.get("hot").cloned().unwrap_or(json!(true)));
    }
    map.insert("devServer".to_string(), dev_server);
}
