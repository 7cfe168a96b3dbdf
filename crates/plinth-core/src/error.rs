//! Unified error types for the Plinth framework.
//!
//! [`StorageError`] covers the persistence collaborator; [`FrameworkError`]
//! is what every framework operation returns.  Lookups never use errors for
//! "not found": they return `None` or an empty list instead.

use std::path::PathBuf;

use semver::Version;
use thiserror::Error;

use crate::id::{FrameworkId, PluginId, ServiceId};
use crate::record::Requirement;
use crate::state::PluginState;

/// Type-erased error returned by activators and listeners.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by a plugin storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A filesystem operation failed.
    #[error("storage I/O error at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted record could not be encoded or decoded.
    #[error("corrupt plugin record at '{}': {source}", .path.display())]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Another framework in this process already owns the storage area.
    #[error("storage '{}' is already in use by another framework", .0.display())]
    Locked(PathBuf),

    /// The storage area exists but cannot be used.
    #[error("storage '{}' is not accessible: {reason}", .path.display())]
    Inaccessible { path: PathBuf, reason: String },
}

impl StorageError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Framework Errors
// =============================================================================

/// Errors returned by framework operations.
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// The storage collaborator failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A plugin with the same name and version is already installed.
    #[error("plugin '{name}' {version} is already installed as {existing}")]
    DuplicateInstall {
        name: String,
        version: Version,
        existing: PluginId,
    },

    /// The requested state change is not an edge of the lifecycle machine.
    #[error("plugin {plugin} ('{name}'): illegal transition {from} -> {to}")]
    IllegalStateTransition {
        plugin: PluginId,
        name: String,
        from: PluginState,
        to: PluginState,
    },

    /// The operation needs the plugin in another state.
    #[error("plugin {plugin} ('{name}') cannot {operation} while {state}")]
    IllegalState {
        plugin: PluginId,
        name: String,
        state: PluginState,
        operation: &'static str,
    },

    /// No installed plugin satisfies a mandatory requirement.
    #[error("plugin {plugin} ('{name}'): unsatisfied requirement '{requirement}'")]
    UnsatisfiedRequirement {
        plugin: PluginId,
        name: String,
        requirement: Requirement,
    },

    /// The requirement graph reachable from the plugin contains a cycle.
    #[error("plugin {plugin} ('{name}'): cyclic requirement {}", .cycle.join(" -> "))]
    CyclicRequirement {
        plugin: PluginId,
        name: String,
        /// Symbolic names along the cycle, first and last equal.
        cycle: Vec<String>,
    },

    /// The handle was issued by another framework instance.
    #[error("plugin {plugin} belongs to framework {owner}, not {expected}")]
    Ownership {
        plugin: PluginId,
        owner: FrameworkId,
        expected: FrameworkId,
    },

    /// The service registration was already removed.
    #[error("service {0} is already unregistered")]
    AlreadyUnregistered(ServiceId),

    /// The framework has not been initialized, or has been uninitialized.
    #[error("framework {0} is not initialized")]
    NotInitialized(FrameworkId),

    /// No plugin with this id is installed.
    #[error("no plugin {0} is installed")]
    UnknownPlugin(PluginId),

    /// An activator hook returned an error or panicked.
    #[error("activator of plugin {plugin} ('{name}') failed: {source}")]
    Activator {
        plugin: PluginId,
        name: String,
        #[source]
        source: BoxError,
    },

    /// A service filter string could not be parsed.
    #[error("invalid service filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

impl FrameworkError {
    /// Creates an invalid filter error.
    pub fn invalid_filter(filter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            filter: filter.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for framework operations.
pub type FrameworkResult<T> = Result<T, FrameworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_joins_path() {
        let err = FrameworkError::CyclicRequirement {
            plugin: PluginId(1),
            name: "a".into(),
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "plugin #1 ('a'): cyclic requirement a -> b -> a"
        );
    }

    #[test]
    fn test_storage_error_converts() {
        let err: FrameworkError = StorageError::Locked(PathBuf::from("/tmp/fw")).into();
        assert!(matches!(err, FrameworkError::Storage(StorageError::Locked(_))));
    }
}
