//! Plugins: descriptors, activators and the plugin registry.

pub mod activator;
pub mod descriptor;
pub mod registry;

pub use activator::{ActivatorFactory, PluginActivator, PluginContext};
pub use descriptor::PluginDescriptor;
pub use registry::{Plugins, SYSTEM_PLUGIN_NAME};
