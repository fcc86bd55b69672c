//! Plugin API: the capability handle each plugin receives.

pub mod command;
pub mod context;

pub use command::Command;
pub use context::PluginApi;
