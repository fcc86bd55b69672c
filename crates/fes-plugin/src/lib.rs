//! # fes-plugin
//!
//! Plugin host for Fes. Provides:
//!
//! - Plugin registry with enablement filtering and `before`/`after` ordering
//! - Hook table keyed by name, one composition type per key
//! - `applyPlugins` dispatcher with `modify`, `event` and `add` semantics
//! - Per-plugin API handle exposing host state and hook registration
//! - Service lifecycle orchestrating config resolution, loading and commands

pub mod api;
pub mod catalog;
pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod prelude;
pub mod registry;
pub mod service;
pub mod traits;

pub use api::PluginApi;
pub use catalog::PluginCatalog;
pub use error::{BoxError, PluginError};
pub use hooks::definitions::{ApplyPluginsType, Hook, HookArgs, HookHandler, HookType};
pub use hooks::dispatcher::{ApplyPluginsCall, HookDispatcher};
pub use hooks::registry::HookTable;
pub use lifecycle::ServicePhase;
pub use registry::{EnableBy, EnableContext, PluginDescriptor, PluginKind, PluginRegistry};
pub use service::{Service, ServiceOptions};
