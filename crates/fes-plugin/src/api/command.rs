//! Commands registered by plugins.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::error::BoxError;
use crate::hooks::definitions::HookFuture;

/// Command body: `(args) -> result`.
pub type CommandFn = Arc<dyn Fn(Value) -> HookFuture<Value> + Send + Sync>;

/// A named command such as `build`.
#[derive(Clone)]
pub struct Command {
    /// Command name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Command body.
    pub handler: CommandFn,
}

impl Command {
    /// Creates a command from an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            handler: Arc::new(move |args: Value| -> HookFuture<Value> { Box::pin(f(args)) }),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// A command together with the plugin that registered it.
#[derive(Debug, Clone)]
pub(crate) struct CommandRecord {
    pub(crate) command: Command,
    pub(crate) plugin_id: String,
}
