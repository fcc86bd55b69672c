//! `alias`: module resolution aliases. `@` and `@@` always point at the
//! source and temp directories.

use fes_plugin::prelude::*;

use super::object_entry;

pub const PLUGIN_ID: &str = "features:alias";
pub const CONFIG_KEY: &str = "alias";

pub fn plugin() -> PluginDescriptor {
    PluginDescriptor::from_fn(PLUGIN_ID, PluginKind::BuiltIn, setup).with_config(CONFIG_KEY, json!({}))
}

async fn setup(api: PluginApi) -> Result<(), BoxError> {
    let hook_api = api.clone();
    api.modify(keys::CHAIN_WEBPACK, move |mut chain: Value, _args: HookArgs| {
        let api = hook_api.clone();
        async move {
            let config = api.config().await;
            let paths = api.paths().await;

            let Some(resolve) = object_entry(&mut chain, "resolve") else {
                return Ok(chain);
            };
            let mut alias = match resolve.remove("alias") {
                Some(Value::Object(existing)) => existing,
                _ => Default::default(),
            };
            alias.insert("@".to_string(), json!(paths.abs_src_path));
            alias.insert("@@".to_string(), json!(paths.abs_tmp_path));
            if let Some(Value::Object(user)) = config.get(CONFIG_KEY) {
                for (name, target) in user {
                    alias.insert(name.clone(), target.clone());
                }
            }
            resolve.insert("alias".to_string(), Value::Object(alias));
            Ok(chain)
        }
    })
    .await?;
    Ok(())
}
