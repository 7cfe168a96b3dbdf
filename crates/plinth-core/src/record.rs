//! Plugin metadata: requirements, persisted records and read-only snapshots.

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::id::PluginId;
use crate::state::PluginState;

// ─── Requirement ──────────────────────────────────────────────────────────────

/// Whether an unsatisfiable requirement blocks resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Resolution fails when no candidate exists.
    #[default]
    Mandatory,
    /// Skipped when no candidate exists. Cycles are still rejected.
    Optional,
}

/// A dependency on another plugin, by symbolic name and version range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Symbolic name of the required plugin.
    pub name: String,
    /// Accepted versions. `*` matches any release.
    pub range: VersionReq,
    /// Mandatory or optional.
    #[serde(default)]
    pub resolution: Resolution,
}

impl Requirement {
    /// A mandatory requirement on any version of `name`.
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: VersionReq::STAR,
            resolution: Resolution::Mandatory,
        }
    }

    /// A mandatory requirement on `name` within `range`.
    pub fn new(name: impl Into<String>, range: VersionReq) -> Self {
        Self {
            name: name.into(),
            range,
            resolution: Resolution::Mandatory,
        }
    }

    /// Marks this requirement optional.
    pub fn optional(mut self) -> Self {
        self.resolution = Resolution::Optional;
        self
    }

    /// Returns `true` if a plugin called `name` at `version` satisfies this.
    pub fn matches(&self, name: &str, version: &Version) -> bool {
        self.name == name && self.range.matches(version)
    }
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.range)?;
        if self.resolution == Resolution::Optional {
            f.write_str(" (optional)")?;
        }
        Ok(())
    }
}

// ─── PluginRecord ─────────────────────────────────────────────────────────────

/// The persisted form of an installed plugin.
///
/// This is what a storage backend reads and writes. It holds no lifecycle
/// state other than the auto-start flag: every plugin comes back as
/// `Installed` after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub id: PluginId,
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// Where the plugin came from, for diagnostics only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Set by an explicit start, cleared by an explicit stop.
    #[serde(default)]
    pub auto_start: bool,
}

// ─── PluginInfo ───────────────────────────────────────────────────────────────

/// Read-only snapshot of a plugin, handed out by lookups.
///
/// The snapshot is detached from the registry: it does not change when the
/// plugin does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub id: PluginId,
    pub name: String,
    pub version: Version,
    pub state: PluginState,
    pub requirements: Vec<Requirement>,
    pub location: Option<String>,
    pub auto_start: bool,
}

impl PluginInfo {
    /// Builds a snapshot from a record and its current state.
    pub fn from_record(record: &PluginRecord, state: PluginState) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            version: record.version.clone(),
            state,
            requirements: record.requirements.clone(),
            location: record.location.clone(),
            auto_start: record.auto_start,
        }
    }
}
