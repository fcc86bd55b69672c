//! Built-in commands.

pub mod build;
pub mod build_dev_utils;

pub use build_dev_utils::{
    BundleAndConfigs, GetConfig, clean_tmp_path_except_cache, get_bundle_and_configs,
};
