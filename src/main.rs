//! Fes: plugin host for the Fes frontend framework.
//!
//! Loads the project configuration, registers the built-in plugins and runs
//! one command (`build` by default).

use serde_json::Value;
use tracing_subscriber::{EnvFilter, fmt};

use fes_built_in::builtin_plugins;
use fes_core::config::{LoggingConfig, StaticConfig};
use fes_core::FesResult;
use fes_core::types::Env;
use fes_plugin::{PluginCatalog, Service, ServiceOptions};

#[tokio::main]
async fn main() {
    let logging = match LoggingConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid logging configuration, using defaults: {}", e);
            LoggingConfig::default()
        }
    };

    init_logging(&logging);

    match run().await {
        Ok(output) => {
            if !output.is_null() {
                println!("{}", output);
            }
        }
        Err(e) => {
            tracing::error!(kind = %e.kind, "{}", e.message);
            std::process::exit(1);
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Statically linked third-party plugins, selectable through `plugins`.
fn plugin_catalog() -> PluginCatalog {
    PluginCatalog::new()
}

async fn run() -> FesResult<Value> {
    let env = match std::env::var("FES_ENV") {
        Ok(value) => value.parse::<Env>()?,
        Err(_) => Env::Production,
    };
    let command = std::env::args().nth(1).unwrap_or_else(|| "build".to_string());
    let cwd = std::env::current_dir()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        env = %env,
        command = %command,
        cwd = %cwd.display(),
        "Starting fes"
    );

    let config = StaticConfig::load(&cwd, env)?;
    let service = Service::new(ServiceOptions::from_static_config(cwd, env, config));

    service.register_plugins(builtin_plugins()).await?;
    service.register_from_catalog(&plugin_catalog()).await?;
    service.init().await?;

    Ok(service.run_command(&command, Value::Null).await?)
}
