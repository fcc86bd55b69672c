//! Hook system: typed definitions, the per-key table, and the dispatcher.

pub mod definitions;
pub mod dispatcher;
pub mod registry;

pub use definitions::{ApplyPluginsType, Hook, HookArgs, HookHandler, HookRecord, HookType, keys};
pub use dispatcher::{ApplyPluginsCall, HookDispatcher};
pub use registry::HookTable;
