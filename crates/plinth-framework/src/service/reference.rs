//! Handles handed out by the service registry.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use plinth_core::{FrameworkId, PluginId, Properties, ServiceId, ServiceInfo, ranking_of};

/// Type-erased service implementation.
pub type ServiceObject = Arc<dyn Any + Send + Sync>;

/// Returned by `register_service`; the owner keeps it to unregister or
/// update the service later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceRegistration {
    pub(crate) framework: FrameworkId,
    pub(crate) id: ServiceId,
    pub(crate) owner: PluginId,
    pub(crate) interface: String,
}

impl ServiceRegistration {
    pub fn framework(&self) -> FrameworkId {
        self.framework
    }

    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn owner(&self) -> PluginId {
        self.owner
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

/// A service found by a lookup: its metadata plus the shared instance.
///
/// The reference stays usable after the service is unregistered; it simply
/// no longer shows up in lookups.
#[derive(Clone)]
pub struct ServiceReference {
    info: ServiceInfo,
    instance: ServiceObject,
}

impl ServiceReference {
    pub(crate) fn new(info: ServiceInfo, instance: ServiceObject) -> Self {
        Self { info, instance }
    }

    pub fn id(&self) -> ServiceId {
        self.info.id
    }

    pub fn owner(&self) -> PluginId {
        self.info.owner
    }

    pub fn interface(&self) -> &str {
        &self.info.interface
    }

    pub fn properties(&self) -> &Properties {
        &self.info.properties
    }

    /// The `service.ranking` property, `0` when unset.
    pub fn ranking(&self) -> i64 {
        ranking_of(&self.info.properties)
    }

    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    /// The instance as a concrete type, if it is one.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance.clone().downcast::<T>().ok()
    }

    /// The untyped instance.
    pub fn object(&self) -> &ServiceObject {
        &self.instance
    }
}

impl fmt::Debug for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceReference")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
