//! # Plinth Framework
//!
//! The in-process plugin framework: lifecycle, dependency resolution,
//! services and events.
//!
//! This layer provides:
//! - [`FrameworkContext`]: init/uninit of one framework instance and every
//!   plugin and service operation
//! - [`Plugins`]: the plugin registry and its lifecycle state machine
//! - Requirement resolution with cycle detection
//! - [`Services`]: a concurrency-safe service registry with LDAP-style
//!   [`ServiceFilter`]s
//! - [`Listeners`]: a synchronous, failure-isolating event bus
//! - [`PluginStorage`] and its filesystem backend [`DirectoryStorage`]
//! - [`PluginActivator`]: start/stop hooks run with a [`PluginContext`]
//!
//! No operation is async.  Blocking only ever means waiting for a lock.

pub mod config;
pub mod context;
pub mod ids;
pub mod listeners;
pub mod plugin;
mod resolver;
pub mod service;
pub mod storage;

pub use config::{DuplicatePolicy, FrameworkConfig};
pub use context::{FrameworkBuilder, FrameworkContext};
pub use ids::FrameworkIdAllocator;
pub use listeners::{ListenerFn, ListenerToken, Listeners};
pub use plugin::{
    ActivatorFactory, PluginActivator, PluginContext, PluginDescriptor, Plugins,
    SYSTEM_PLUGIN_NAME,
};
pub use service::{
    ServiceFilter, ServiceObject, ServiceReference, ServiceRegistration, Services,
};
pub use storage::{DirectoryStorage, PluginStorage};

/// Everything needed to host plugins or write one.
pub mod prelude {
    pub use crate::{
        DirectoryStorage, FrameworkConfig, FrameworkContext, PluginActivator, PluginContext,
        PluginDescriptor, PluginStorage, ServiceFilter, ServiceReference, ServiceRegistration,
    };
    pub use plinth_core::{
        BoxError, Event, EventKind, FrameworkError, FrameworkEvent, FrameworkResult, PluginRef,
        PluginState, Properties, Requirement, Version, VersionReq,
    };
}
