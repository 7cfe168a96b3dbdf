//! Plugin lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a plugin.
///
/// The legal edges are:
///
/// ```text
/// Installed ──► Resolved ──► Starting ──► Active ──► Stopping ──► Resolved
///                               └──────► Resolved   (activator start failed)
/// any (except Uninstalled) ──► Uninstalled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    /// Installed, requirements not yet checked.
    Installed,
    /// All requirements are satisfied by resolved plugins.
    Resolved,
    /// The activator's `start` hook is running.
    Starting,
    /// Started and allowed to publish services.
    Active,
    /// The activator's `stop` hook is running.
    Stopping,
    /// Removed from the framework. Terminal.
    Uninstalled,
}

impl PluginState {
    /// Returns `true` when `self → to` is an edge of the state machine.
    pub fn can_transition_to(self, to: PluginState) -> bool {
        use PluginState::*;
        matches!(
            (self, to),
            (Installed, Resolved)
                | (Resolved, Starting)
                | (Starting, Active)
                | (Starting, Resolved)
                | (Active, Stopping)
                | (Stopping, Resolved)
                | (Installed | Resolved | Starting | Active | Stopping, Uninstalled)
        )
    }

    /// `true` for every state in which the requirements are known to be met.
    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            PluginState::Resolved
                | PluginState::Starting
                | PluginState::Active
                | PluginState::Stopping
        )
    }

    /// `true` for states in which the plugin may own services.
    pub fn may_own_services(self) -> bool {
        matches!(self, PluginState::Starting | PluginState::Active)
    }

    /// Lower-case name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            PluginState::Installed => "installed",
            PluginState::Resolved => "resolved",
            PluginState::Starting => "starting",
            PluginState::Active => "active",
            PluginState::Stopping => "stopping",
            PluginState::Uninstalled => "uninstalled",
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::PluginState::*;
    use super::*;

    #[test]
    fn test_forward_path_is_legal() {
        let path = [Installed, Resolved, Starting, Active, Stopping, Resolved];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_shortcuts_are_illegal() {
        assert!(!Installed.can_transition_to(Active));
        assert!(!Installed.can_transition_to(Starting));
        assert!(!Resolved.can_transition_to(Active));
        assert!(!Active.can_transition_to(Resolved));
        assert!(!Resolved.can_transition_to(Installed));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn test_uninstall_from_anywhere_but_uninstalled() {
        for s in [Installed, Resolved, Starting, Active, Stopping] {
            assert!(s.can_transition_to(Uninstalled));
        }
        assert!(!Uninstalled.can_transition_to(Uninstalled));
        assert!(!Uninstalled.can_transition_to(Installed));
    }

    #[test]
    fn test_resolved_flags() {
        assert!(!Installed.is_resolved());
        assert!(Resolved.is_resolved());
        assert!(Active.is_resolved());
        assert!(!Uninstalled.is_resolved());
    }
}
