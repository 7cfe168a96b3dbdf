//! Plugin descriptor: what `install` needs to know about a plugin.

use std::fmt;
use std::sync::Arc;

use plinth_core::{PluginId, PluginRecord, Requirement, Version};

use super::activator::{ActivatorFactory, PluginActivator};

// ─── PluginDescriptor ─────────────────────────────────────────────────────────

/// Describes a plugin to install: identity, requirements and, optionally,
/// the factory of its activator.
///
/// # Example
///
/// ```rust,ignore
/// let descriptor = PluginDescriptor::new("viewer", Version::new(1, 2, 0))
///     .requires(Requirement::new("codec", VersionReq::parse("^2")?))
///     .requires(Requirement::any("telemetry").optional())
///     .activator(|| ViewerActivator::default());
///
/// let viewer = framework.install(descriptor)?;
/// ```
#[derive(Clone)]
pub struct PluginDescriptor {
    pub(crate) name: String,
    pub(crate) version: Version,
    pub(crate) requirements: Vec<Requirement>,
    pub(crate) location: Option<String>,
    pub(crate) factory: Option<ActivatorFactory>,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            requirements: Vec::new(),
            location: None,
            factory: None,
        }
    }

    /// Appends a requirement. Declaration order is resolution order.
    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Records where the plugin came from.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the activator created each time the plugin starts.
    pub fn activator<A, F>(mut self, create: F) -> Self
    where
        A: PluginActivator,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(move || Box::new(create()) as Box<dyn PluginActivator>));
        self
    }

    /// Sets an already type-erased activator factory.
    pub fn activator_factory(mut self, factory: ActivatorFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub(crate) fn into_record(self, id: PluginId) -> (PluginRecord, Option<ActivatorFactory>) {
        let record = PluginRecord {
            id,
            name: self.name,
            version: self.version,
            requirements: self.requirements,
            location: self.location,
            auto_start: false,
        };
        (record, self.factory)
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("requirements", &self.requirements)
            .field("location", &self.location)
            .field("activator", &self.factory.is_some())
            .finish()
    }
}
