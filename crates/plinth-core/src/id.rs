//! Identifier newtypes.
//!
//! All cross-component references in Plinth are plain identifiers looked up
//! in registry-owned tables.  None of these types keep anything alive.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Process-unique identity of one framework instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameworkId(pub u64);

impl fmt::Display for FrameworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a plugin inside one framework instance.
///
/// Id `0` is reserved for the system plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(pub u64);

impl PluginId {
    /// The framework's own plugin.
    pub const SYSTEM: PluginId = PluginId(0);

    /// Returns `true` for the system plugin id.
    pub fn is_system(self) -> bool {
        self == Self::SYSTEM
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a service registration, unique within a framework instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub u64);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-owning handle to a plugin installed in a specific framework.
///
/// The handle stays valid as a lookup key after the plugin is uninstalled;
/// lookups through it then simply return nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginRef {
    /// Framework that issued this handle.
    pub framework: FrameworkId,
    /// Plugin id inside that framework.
    pub id: PluginId,
}

impl PluginRef {
    /// Creates a handle. Only frameworks should mint these.
    pub fn new(framework: FrameworkId, id: PluginId) -> Self {
        Self { framework, id }
    }
}

impl fmt::Display for PluginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@fw{}", self.id, self.framework)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_plugin_id() {
        assert!(PluginId::SYSTEM.is_system());
        assert!(!PluginId(7).is_system());
    }

    #[test]
    fn test_plugin_ref_display() {
        let r = PluginRef::new(FrameworkId(3), PluginId(12));
        assert_eq!(r.to_string(), "#12@fw3");
    }
}
