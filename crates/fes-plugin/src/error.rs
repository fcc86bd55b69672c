//! Plugin host error taxonomy.

use thiserror::Error;

use fes_core::error::{ErrorKind, FesError};

use crate::hooks::definitions::HookType;
use crate::lifecycle::ServicePhase;

/// Error type returned by plugin setup functions, hook handlers and commands.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the plugin host.
///
/// Every variant that can be traced to a plugin carries its id so failures
/// are attributable without a backtrace.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A plugin with the same id is already registered.
    #[error("Plugin '{id}' is already registered")]
    DuplicateId {
        /// The duplicated id.
        id: String,
    },

    /// A descriptor failed validation at registration.
    #[error("Invalid plugin descriptor '{id}': {reason}")]
    InvalidDescriptor {
        /// Offending plugin id (may be empty).
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// `before`/`after` constraints cannot be satisfied.
    #[error("Plugin ordering constraints form a cycle among: {}", plugins.join(", "))]
    CyclicDependency {
        /// Plugins that could not be ordered.
        plugins: Vec<String>,
    },

    /// A constraint references a plugin that was never registered.
    #[error("Plugin '{plugin_id}' references unknown plugin '{dependency}'")]
    UnknownDependency {
        /// Plugin declaring the constraint.
        plugin_id: String,
        /// Referenced id.
        dependency: String,
    },

    /// A plugin id requested by the user configuration is not in the catalog.
    #[error("Plugin '{id}' not found")]
    PluginNotFound {
        /// Requested id.
        id: String,
    },

    /// A key was used with two different hook types.
    #[error("Hook '{key}' is a {existing} hook and cannot be used as {requested}")]
    HookTypeConflict {
        /// Hook key.
        key: String,
        /// Type the key is already bound to.
        existing: HookType,
        /// Type that was attempted.
        requested: HookType,
        /// Plugin that attempted it, if the conflict came from registration.
        plugin_id: Option<String>,
    },

    /// A plugin's setup function failed.
    #[error("Plugin '{plugin_id}' failed during setup: {source}")]
    PluginApply {
        /// Plugin id.
        plugin_id: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// A hook handler failed during `applyPlugins`.
    #[error("Handler for {hook_type} hook '{key}' from plugin '{plugin_id}' failed: {source}")]
    Handler {
        /// Plugin that registered the handler.
        plugin_id: String,
        /// Hook key.
        key: String,
        /// Hook type.
        hook_type: HookType,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// A hook or command was registered outside the loading phase.
    #[error("Plugin '{plugin_id}' cannot register '{key}' while the service is {phase}")]
    LateRegistration {
        /// Registering plugin.
        plugin_id: String,
        /// Hook key or command name.
        key: String,
        /// Phase at the time of the attempt.
        phase: ServicePhase,
    },

    /// An operation was attempted in a phase that does not allow it.
    #[error("Cannot {operation} while the service is {phase}")]
    LifecycleViolation {
        /// What was attempted.
        operation: &'static str,
        /// Current phase.
        phase: ServicePhase,
    },

    /// The service was asked to move to a phase it cannot reach.
    #[error("Invalid service transition from {from} to {to}")]
    InvalidTransition {
        /// Current phase.
        from: ServicePhase,
        /// Requested phase.
        to: ServicePhase,
    },

    /// No plugin registered the requested command.
    #[error("Command '{name}' not found")]
    CommandNotFound {
        /// Command name.
        name: String,
    },

    /// Two plugins registered the same command name.
    #[error("Command '{name}' from plugin '{plugin_id}' is already registered by '{existing}'")]
    DuplicateCommand {
        /// Command name.
        name: String,
        /// Plugin attempting the registration.
        plugin_id: String,
        /// Plugin that registered it first.
        existing: String,
    },

    /// A command body failed.
    #[error("Command '{name}' from plugin '{plugin_id}' failed: {source}")]
    Command {
        /// Command name.
        name: String,
        /// Plugin that registered the command.
        plugin_id: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] FesError),
}

impl PluginError {
    /// Returns the plugin this error is attributed to, if any.
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            Self::DuplicateId { id } | Self::InvalidDescriptor { id, .. } => Some(id.as_str()),
            Self::UnknownDependency { plugin_id, .. }
            | Self::PluginApply { plugin_id, .. }
            | Self::Handler { plugin_id, .. }
            | Self::LateRegistration { plugin_id, .. }
            | Self::DuplicateCommand { plugin_id, .. }
            | Self::Command { plugin_id, .. } => Some(plugin_id.as_str()),
            Self::HookTypeConflict { plugin_id, .. } => plugin_id.as_deref(),
            _ => None,
        }
    }
}

impl From<PluginError> for FesError {
    fn from(err: PluginError) -> Self {
        let kind = match &err {
            PluginError::Config(inner) => return inner.clone(),
            PluginError::PluginNotFound { .. } | PluginError::CommandNotFound { .. } => {
                ErrorKind::NotFound
            }
            PluginError::Handler { .. } | PluginError::Command { .. } => ErrorKind::Hook,
            _ => ErrorKind::Plugin,
        };
        FesError::with_source(kind, err.to_string(), err)
    }
}
