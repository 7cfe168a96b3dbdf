//! # Plinth Core
//!
//! The data model shared by every layer of the Plinth plugin framework.
//!
//! This crate contains no behaviour that touches shared state; it only
//! defines the vocabulary the framework speaks:
//!
//! - **Identity**: [`FrameworkId`], [`PluginId`], [`ServiceId`] and the
//!   [`PluginRef`] handle returned to callers.
//! - **Lifecycle**: the [`PluginState`] machine and its legal edges.
//! - **Metadata**: [`Requirement`]s, persisted [`PluginRecord`]s and the
//!   read-only [`PluginInfo`] snapshot.
//! - **Services**: the [`Properties`] map and its standard keys.
//! - **Events**: [`Event`] and its plugin / service / framework payloads.
//! - **Errors**: [`FrameworkError`] and [`StorageError`].
//!
//! ## Lifecycle
//!
//! ```text
//! install ──► INSTALLED ──resolve──► RESOLVED ──start──► STARTING ──► ACTIVE
//!                                       ▲                    │           │
//!                                       │◄── start failed ───┘         stop
//!                                       │                                ▼
//!                                       └─────────────────────────── STOPPING
//!
//! any state ──uninstall──► UNINSTALLED
//! ```

pub mod error;
pub mod event;
pub mod id;
pub mod properties;
pub mod record;
pub mod state;

pub use error::{BoxError, FrameworkError, FrameworkResult, StorageError, StorageResult};
pub use event::{
    Event, EventKind, FrameworkEvent, PluginEvent, PluginEventKind, ServiceEvent,
    ServiceEventKind, ServiceInfo,
};
pub use id::{FrameworkId, PluginId, PluginRef, ServiceId};
pub use properties::{OBJECT_CLASS, Properties, SERVICE_ID, SERVICE_RANKING, ranking_of};
pub use record::{PluginInfo, PluginRecord, Requirement, Resolution};
pub use state::PluginState;

// Re-exported so downstream crates name versions through one path.
pub use semver::{Version, VersionReq};
