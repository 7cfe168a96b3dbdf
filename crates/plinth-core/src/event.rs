//! Events distributed by the listener bus.
//!
//! Every event belongs to exactly one [`EventKind`]; subscribers register
//! interest per kind.  Payloads are detached snapshots, so a subscriber can
//! hold on to an event without keeping any framework state alive.

use std::fmt;

use semver::Version;

use crate::id::{FrameworkId, PluginId, ServiceId};
use crate::properties::Properties;
use crate::state::PluginState;

/// Coarse category used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Plugin,
    Service,
    Framework,
}

/// An event published on the listener bus.
#[derive(Debug, Clone)]
pub enum Event {
    Plugin(PluginEvent),
    Service(ServiceEvent),
    Framework(FrameworkEvent),
}

impl Event {
    /// The subscription category of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Plugin(_) => EventKind::Plugin,
            Event::Service(_) => EventKind::Service,
            Event::Framework(_) => EventKind::Framework,
        }
    }

    /// Position of a plugin or service event in its instance's change order.
    /// Framework events carry none.
    pub fn sequence(&self) -> Option<u64> {
        match self {
            Event::Plugin(e) => Some(e.sequence),
            Event::Service(e) => Some(e.sequence),
            Event::Framework(_) => None,
        }
    }

    /// Returns the plugin payload, if this is a plugin event.
    pub fn as_plugin(&self) -> Option<&PluginEvent> {
        match self {
            Event::Plugin(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the service payload, if this is a service event.
    pub fn as_service(&self) -> Option<&ServiceEvent> {
        match self {
            Event::Service(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the framework payload, if this is a framework event.
    pub fn as_framework(&self) -> Option<&FrameworkEvent> {
        match self {
            Event::Framework(e) => Some(e),
            _ => None,
        }
    }
}

// ─── Plugin events ────────────────────────────────────────────────────────────

/// What happened to a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginEventKind {
    Installed,
    Resolved,
    Starting,
    Started,
    Stopping,
    Stopped,
    Uninstalled,
}

impl PluginEventKind {
    /// The event announced when a plugin moves from `from` into `to`.
    pub fn for_transition(from: PluginState, to: PluginState) -> Self {
        match (from, to) {
            (_, PluginState::Installed) => PluginEventKind::Installed,
            (PluginState::Installed, PluginState::Resolved) => PluginEventKind::Resolved,
            (_, PluginState::Resolved) => PluginEventKind::Stopped,
            (_, PluginState::Starting) => PluginEventKind::Starting,
            (_, PluginState::Active) => PluginEventKind::Started,
            (_, PluginState::Stopping) => PluginEventKind::Stopping,
            (_, PluginState::Uninstalled) => PluginEventKind::Uninstalled,
        }
    }
}

/// A lifecycle change of one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEvent {
    /// Taken when the change was applied; see [`ServiceEvent::sequence`].
    pub sequence: u64,
    pub kind: PluginEventKind,
    pub framework: FrameworkId,
    pub plugin: PluginId,
    pub name: String,
    pub version: Version,
}

// ─── Service events ───────────────────────────────────────────────────────────

/// What happened to a service registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEventKind {
    Registered,
    Modified,
    /// Published after the entry has left the registry.
    Unregistered,
}

/// Instance-free description of a service registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInfo {
    pub id: ServiceId,
    pub owner: PluginId,
    pub interface: String,
    pub properties: Properties,
}

/// A change to one service registration.
///
/// Events caused on different threads may reach listeners in a different
/// order than the changes were applied, for example a `Registered` racing
/// the owner's stop.  `sequence` is taken while the change is applied and
/// is shared by the plugin and service events of one instance, so sorting
/// by it restores the order of the changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEvent {
    pub sequence: u64,
    pub kind: ServiceEventKind,
    pub framework: FrameworkId,
    pub service: ServiceInfo,
}

// ─── Framework events ─────────────────────────────────────────────────────────

/// Framework-wide notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameworkEvent {
    /// `launch` finished starting the auto-start plugins.
    Started { framework: FrameworkId },
    /// `shutdown` is about to uninitialize the framework.
    Stopping { framework: FrameworkId },
    /// `shutdown` finished.
    Stopped { framework: FrameworkId },
    /// A best-effort step failed: a listener, an activator, a cleanup.
    Error {
        framework: FrameworkId,
        plugin: Option<PluginId>,
        message: String,
    },
}

impl fmt::Display for FrameworkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameworkEvent::Started { framework } => write!(f, "framework {framework} started"),
            FrameworkEvent::Stopping { framework } => write!(f, "framework {framework} stopping"),
            FrameworkEvent::Stopped { framework } => write!(f, "framework {framework} stopped"),
            FrameworkEvent::Error {
                framework,
                plugin: Some(plugin),
                message,
            } => write!(f, "framework {framework} error in plugin {plugin}: {message}"),
            FrameworkEvent::Error {
                framework, message, ..
            } => write!(f, "framework {framework} error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_event_kinds() {
        use PluginState::*;
        assert_eq!(
            PluginEventKind::for_transition(Installed, Resolved),
            PluginEventKind::Resolved
        );
        assert_eq!(
            PluginEventKind::for_transition(Stopping, Resolved),
            PluginEventKind::Stopped
        );
        assert_eq!(
            PluginEventKind::for_transition(Starting, Resolved),
            PluginEventKind::Stopped
        );
        assert_eq!(
            PluginEventKind::for_transition(Active, Uninstalled),
            PluginEventKind::Uninstalled
        );
    }

    #[test]
    fn test_event_kind_matches_payload() {
        let event = Event::Framework(FrameworkEvent::Started {
            framework: FrameworkId(1),
        });
        assert_eq!(event.kind(), EventKind::Framework);
        assert!(event.as_plugin().is_none());
        assert!(event.as_framework().is_some());
        assert_eq!(event.sequence(), None);
    }
}
