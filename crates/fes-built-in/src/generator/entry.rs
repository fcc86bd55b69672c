//! Writes the application entry `<absTmpPath>/fes.js`.
//!
//! Contents come from four `add` hooks, in this order in the file:
//! `addEntryImportsAhead`, `addEntryImports`, `addEntryCodeAhead`,
//! `addEntryCode`. Import items are either a raw string or an object
//! `{ source, specifier? }`; code items are strings.

use serde_json::{Value, json};
use tracing::info;

use fes_plugin::hooks::keys;
use fes_plugin::{ApplyPluginsCall, BoxError, HookArgs, PluginApi, PluginDescriptor, PluginKind};

use crate::commands::build_dev_utils::ENTRY_FILE;
use crate::error::BuildError;

pub const PLUGIN_ID: &str = "generator:entry";

const HEADER: &str = "// @ts-nocheck\n// This file is generated by fes, do not edit.";

pub fn plugin() -> PluginDescriptor {
    PluginDescriptor::from_fn(PLUGIN_ID, PluginKind::BuiltIn, setup)
}

async fn setup(api: PluginApi) -> Result<(), BoxError> {
    let handler_api = api.clone();
    api.on_event(keys::ON_GENERATE_FILES, move |_args: HookArgs| {
        let api = handler_api.clone();
        async move {
            write_entry(&api)
                .await
                .map(|_| ())
                .map_err(BoxError::from)
        }
    })
    .await?;
    Ok(())
}

/// Collects the entry hooks and writes the entry file. Returns its contents.
pub async fn write_entry(api: &PluginApi) -> Result<String, BuildError> {
    let imports_ahead = collect(api, keys::ADD_ENTRY_IMPORTS_AHEAD).await?;
    let imports = collect(api, keys::ADD_ENTRY_IMPORTS).await?;
    let code_ahead = collect(api, keys::ADD_ENTRY_CODE_AHEAD).await?;
    let code = collect(api, keys::ADD_ENTRY_CODE).await?;

    let contents = render(&imports_ahead, &imports, &code_ahead, &code);

    let tmp = api.paths().await.abs_tmp_path.clone();
    tokio::fs::create_dir_all(&tmp)
        .await
        .map_err(|e| BuildError::io(&tmp, e))?;
    let target = tmp.join(ENTRY_FILE);
    tokio::fs::write(&target, &contents)
        .await
        .map_err(|e| BuildError::io(&target, e))?;

    info!(path = %target.display(), "Entry generated");
    Ok(contents)
}

async fn collect(api: &PluginApi, key: &str) -> Result<Vec<Value>, BuildError> {
    let items = api
        .apply_plugins(ApplyPluginsCall::add(key, json!([])))
        .await?;
    Ok(match items {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

fn render(imports_ahead: &[Value], imports: &[Value], code_ahead: &[Value], code: &[Value]) -> String {
    let sections = [
        HEADER.to_string(),
        imports_ahead.iter().filter_map(render_import).collect::<Vec<_>>().join("\n"),
        imports.iter().filter_map(render_import).collect::<Vec<_>>().join("\n"),
        code_ahead.iter().filter_map(render_code).collect::<Vec<_>>().join("\n"),
        code.iter().filter_map(render_code).collect::<Vec<_>>().join("\n"),
    ];

    let mut out = sections
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    out.push('\n');
    out
}

fn render_import(item: &Value) -> Option<String> {
    match item {
        Value::String(line) => Some(line.clone()),
        Value::Object(map) => {
            let source = map.get("source")?.as_str()?;
            Some(match map.get("specifier").and_then(Value::as_str) {
                Some(specifier) => format!("import {specifier} from '{source}';"),
                None => format!("import '{source}';"),
            })
        }
        _ => None,
    }
}

fn render_code(item: &Value) -> Option<String> {
    item.as_str().map(str::to_string)
}
