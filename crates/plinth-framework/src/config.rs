//! Framework-instance configuration.
//!
//! [`FrameworkConfig`] is a plain serde struct so that the runtime can embed
//! it in its figment-loaded configuration under the `framework` key:
//!
//! ```toml
//! [framework]
//! storage_dir = "./plinth-storage"
//! clean_on_first_init = false
//! cleanup_fresh_storage = true
//! duplicates = "reject"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What `install` does when the same name and version is already installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with `DuplicateInstall`.
    #[default]
    Reject,
    /// Install a second copy under a new id.
    Allow,
}

/// Settings for one framework instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Root of the directory storage: plugin records and private data dirs.
    pub storage_dir: PathBuf,

    /// Wipe every persisted plugin when this context initializes for the
    /// first time over an existing storage area.
    pub clean_on_first_init: bool,

    /// Delete the storage directory on `uninit` when the first `init`
    /// created it.
    pub cleanup_fresh_storage: bool,

    /// Duplicate name/version policy.
    pub duplicates: DuplicatePolicy,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("plinth-storage"),
            clean_on_first_init: false,
            cleanup_fresh_storage: true,
            duplicates: DuplicatePolicy::Reject,
        }
    }
}

impl FrameworkConfig {
    /// Default settings rooted at `storage_dir`.
    pub fn with_storage_dir(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Self::default()
        }
    }
}
