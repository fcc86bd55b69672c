//! Built-in plugins for Fes.
//!
//! Ships the plugins every project loads, in a fixed order, together with
//! the bundler contract and the `build` command that drives the
//! bundle-config hook sequence.

pub mod bundler;
pub mod commands;
pub mod error;
pub mod features;
pub mod generator;

use fes_plugin::PluginDescriptor;

pub use bundler::{
    Bundler, BundlerCatalog, BundlerContext, BundlerFactory, BundlerHooks, DefaultBundler,
    DefaultBundlerFactory,
};
pub use commands::{BundleAndConfigs, GetConfig, get_bundle_and_configs};
pub use error::BuildError;

/// Built-in plugins with the default bundler catalog.
pub fn builtin_plugins() -> Vec<PluginDescriptor> {
    builtin_plugins_with(BundlerCatalog::default())
}

/// Built-in plugins in load order, building with `bundlers`.
pub fn builtin_plugins_with(bundlers: BundlerCatalog) -> Vec<PluginDescriptor> {
    vec![
        generator::entry::plugin(),
        features::output_path::plugin(),
        features::define::plugin(),
        features::alias::plugin(),
        features::public_path::plugin(),
        features::dev_server::plugin(),
        commands::build::plugin(bundlers),
    ]
}
