//! Service lifecycle phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phases a [`Service`](crate::service::Service) moves through, in order.
///
/// ```text
/// Created → ConfigResolved → PluginsLoading → PluginsReady → Running → Done
/// ```
///
/// Any phase may jump straight to `Done` when the run aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicePhase {
    /// Constructed; plugins may still be registered.
    Created,
    /// User configuration merged with plugin defaults.
    ConfigResolved,
    /// Enabled plugins are running their setup functions.
    PluginsLoading,
    /// Every setup has settled; the hook table is frozen.
    PluginsReady,
    /// A command is executing.
    Running,
    /// Terminal.
    Done,
}

impl ServicePhase {
    /// Returns the string name of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ConfigResolved => "config_resolved",
            Self::PluginsLoading => "plugins_loading",
            Self::PluginsReady => "plugins_ready",
            Self::Running => "running",
            Self::Done => "done",
        }
    }

    /// Returns whether `next` is a legal successor of this phase.
    pub fn can_transition_to(&self, next: ServicePhase) -> bool {
        match (self, next) {
            (Self::Done, _) => false,
            (_, Self::Done) => true,
            (Self::Created, Self::ConfigResolved)
            | (Self::ConfigResolved, Self::PluginsLoading)
            | (Self::PluginsLoading, Self::PluginsReady)
            | (Self::PluginsReady, Self::Running) => true,
            _ => false,
        }
    }

    /// Hooks and commands may only be registered while plugins load.
    pub fn accepts_registration(&self) -> bool {
        matches!(self, Self::PluginsLoading)
    }

    /// `applyPlugins` needs a complete hook table and a live service.
    pub fn accepts_apply(&self) -> bool {
        matches!(self, Self::PluginsReady | Self::Running)
    }
}

impl fmt::Display for ServicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_chain() {
        let chain = [
            ServicePhase::Created,
            ServicePhase::ConfigResolved,
            ServicePhase::PluginsLoading,
            ServicePhase::PluginsReady,
            ServicePhase::Running,
            ServicePhase::Done,
        ];
        for pair in chain.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_skipping_or_leaving_done() {
        assert!(!ServicePhase::Created.can_transition_to(ServicePhase::PluginsReady));
        assert!(!ServicePhase::Running.can_transition_to(ServicePhase::PluginsLoading));
        assert!(!ServicePhase::Done.can_transition_to(ServicePhase::Done));
        assert!(ServicePhase::PluginsLoading.can_transition_to(ServicePhase::Done));
    }
}
