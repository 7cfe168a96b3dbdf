//! Activators and the context they run with.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use serde_json::Value;

use plinth_core::{
    BoxError, Event, EventKind, FrameworkError, FrameworkResult, PluginRef, Properties,
};

use crate::context::{FrameworkContext, FrameworkInner};
use crate::listeners::{ListenerToken, panic_message};
use crate::service::{ServiceFilter, ServiceObject, ServiceReference, ServiceRegistration};

// ─── PluginActivator ──────────────────────────────────────────────────────────

/// Start and stop hooks of a plugin.
///
/// `start` runs while the plugin is STARTING and may register services.
/// An error (or a panic) returns the plugin to RESOLVED and drops anything
/// it registered.  `stop` runs while the plugin is STOPPING; by then its
/// services have already been unregistered.
///
/// A fresh activator is created from the plugin's factory on every start
/// and dropped after the matching stop.
pub trait PluginActivator: Send + Sync + 'static {
    fn start(&self, ctx: &PluginContext) -> Result<(), BoxError>;

    fn stop(&self, ctx: &PluginContext) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }
}

/// Creates activator instances.
pub type ActivatorFactory = Arc<dyn Fn() -> Box<dyn PluginActivator> + Send + Sync>;

/// Runs `f`, turning a panic into an error.
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, BoxError>) -> Result<T, BoxError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(panic_message(payload.as_ref()).into()),
    }
}

// ─── PluginContext ────────────────────────────────────────────────────────────

/// What a running plugin sees of the framework.
///
/// The context refers to the framework weakly: once the framework is gone,
/// every call that needs it fails with `NotInitialized`.
#[derive(Clone)]
pub struct PluginContext {
    plugin: PluginRef,
    name: String,
    config: Arc<Value>,
    framework: Weak<FrameworkInner>,
}

impl PluginContext {
    pub(crate) fn new(
        plugin: PluginRef,
        name: String,
        config: Arc<Value>,
        framework: Weak<FrameworkInner>,
    ) -> Self {
        Self {
            plugin,
            name,
            config,
            framework,
        }
    }

    /// This plugin's handle.
    pub fn plugin(&self) -> PluginRef {
        self.plugin
    }

    /// This plugin's symbolic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning framework, while it is alive.
    pub fn framework(&self) -> FrameworkResult<FrameworkContext> {
        self.framework
            .upgrade()
            .map(FrameworkContext::from_inner)
            .ok_or(FrameworkError::NotInitialized(self.plugin.framework))
    }

    /// Deserialises this plugin's configuration section into `T`.
    ///
    /// The section is the entry named after the plugin in the `plugins`
    /// table of the configuration, or an empty object when there is none.
    ///
    /// ```rust,ignore
    /// #[derive(serde::Deserialize, Default)]
    /// #[serde(default)]
    /// struct GreeterConfig { greeting: String }
    ///
    /// let cfg: GreeterConfig = ctx.get_config()?;
    /// ```
    pub fn get_config<T>(&self) -> serde_json::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        T::deserialize(self.config.as_ref())
    }

    /// The raw configuration section.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// This plugin's private data directory.
    pub fn data_dir(&self) -> FrameworkResult<PathBuf> {
        self.framework()?.data_storage(self.plugin)
    }

    /// Registers a service owned by this plugin.
    pub fn register_service(
        &self,
        interface: &str,
        instance: ServiceObject,
        properties: Properties,
    ) -> FrameworkResult<ServiceRegistration> {
        self.framework()?
            .register_service(self.plugin, interface, instance, properties)
    }

    pub fn unregister_service(&self, registration: &ServiceRegistration) -> FrameworkResult<()> {
        self.framework()?.unregister_service(registration)
    }

    /// See [`FrameworkContext::find_services`].
    pub fn find_services(
        &self,
        interface: &str,
        filter: Option<&ServiceFilter>,
    ) -> Vec<ServiceReference> {
        self.framework()
            .map(|fw| fw.find_services(interface, filter))
            .unwrap_or_default()
    }

    /// The best-ranked service under `interface`, as `T`.
    pub fn service<T: std::any::Any + Send + Sync>(&self, interface: &str) -> Option<Arc<T>> {
        self.framework().ok()?.service::<T>(interface)
    }

    /// Subscribes to framework events.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> FrameworkResult<ListenerToken>
    where
        F: Fn(&Event) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Ok(self.framework()?.subscribe(kind, callback))
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin", &self.plugin)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_turns_panic_into_error() {
        let err = guarded::<()>(|| panic!("bad activator")).unwrap_err();
        assert!(err.to_string().contains("bad activator"));
        assert_eq!(guarded(|| Ok(3)).unwrap(), 3);
    }

    #[test]
    fn test_context_without_framework() {
        let ctx = PluginContext::new(
            PluginRef::new(plinth_core::FrameworkId(4), plinth_core::PluginId(2)),
            "orphan".into(),
            Arc::new(serde_json::json!({ "greeting": "hi" })),
            Weak::new(),
        );
        assert!(matches!(
            ctx.data_dir(),
            Err(FrameworkError::NotInitialized(_))
        ));
        assert!(ctx.find_services("x", None).is_empty());

        #[derive(serde::Deserialize)]
        struct Cfg {
            greeting: String,
        }
        assert_eq!(ctx.get_config::<Cfg>().unwrap().greeting, "hi");
    }
}
