//! Prelude for convenient imports.

pub use async_trait::async_trait;
pub use serde_json::{Value, json};

pub use crate::api::{Command, PluginApi};
pub use crate::error::{BoxError, PluginError};
pub use crate::hooks::definitions::{Hook, HookArgs, HookHandler, HookType, keys};
pub use crate::hooks::dispatcher::ApplyPluginsCall;
pub use crate::registry::{EnableBy, EnableContext, PluginApply, PluginDescriptor, PluginKind};
pub use crate::traits::{AddHook, EventHook, ModifyHook};
