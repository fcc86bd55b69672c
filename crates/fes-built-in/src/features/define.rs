//! `define`: compile-time constants, plus `process.env.NODE_ENV`.

use serde_json::Map;

use fes_plugin::prelude::*;

use super::object_entry;

pub const PLUGIN_ID: &str = "features:define";
pub const CONFIG_KEY: &str = "define";

pub fn plugin() -> PluginDescriptor {
    PluginDescriptor::from_fn(PLUGIN_ID, PluginKind::BuiltIn, setup).with_config(CONFIG_KEY, json!({}))
}

async fn setup(api: PluginApi) -> Result<(), BoxError> {
    let hook_api = api.clone();
    api.modify(keys::CHAIN_WEBPACK, move |mut chain: Value, _args: HookArgs| {
        let api = hook_api.clone();
        async move {
            let config = api.config().await;
            let defines = definitions(api.env().as_str(), config.get(CONFIG_KEY));
            if let Some(define) = object_entry(&mut chain, "define") {
                define.extend(defines);
            }
            Ok(chain)
        }
    })
    .await?;
    Ok(())
}

/// Values are emitted as source literals, the way a define plugin expects.
fn definitions(env: &str, user: Option<&Value>) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("process.env.NODE_ENV".to_string(), json!(format!("\"{env}\"")));
    if let Some(Value::Object(user)) = user {
        for (key, value) in user {
            out.insert(key.clone(), json!(value.to_string()));
        }
    }
    out
}
