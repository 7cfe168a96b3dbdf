//! The framework context: entry point of one framework instance.
//!
//! A [`FrameworkContext`] owns the storage, the plugin and service
//! registries and the listener bus of one instance.  It is cheap to clone;
//! clones share the instance.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use plinth_framework::prelude::*;
//!
//! let framework = FrameworkContext::builder()
//!     .config(FrameworkConfig::with_storage_dir("/var/lib/viewer/plugins"))
//!     .build();
//! framework.init()?;
//!
//! let codec = framework.install(
//!     PluginDescriptor::new("codec", Version::new(2, 1, 0)).activator(|| CodecActivator),
//! )?;
//! framework.start_plugin(codec)?;
//! // ...
//! framework.uninit()?;
//! ```
//!
//! # Locks
//!
//! | Lock | Guards |
//! |------|--------|
//! | lifecycle mutex | `init` / `uninit` |
//! | plugin table mutex | transitions, installs, uninstalls, resolution passes |
//! | service table rwlock | service entries |
//!
//! The plugin table lock may be held while taking the service table lock,
//! never the other way round.  Activator hooks and listeners run with no
//! framework lock held.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use plinth_core::{
    BoxError, Event, EventKind, FrameworkError, FrameworkEvent, FrameworkId, FrameworkResult,
    PluginId, PluginInfo, PluginRecord, PluginRef, PluginState, Properties, Version, VersionReq,
};

use crate::config::FrameworkConfig;
use crate::ids::FrameworkIdAllocator;
use crate::listeners::{ListenerToken, Listeners};
use crate::plugin::activator::guarded;
use crate::plugin::{ActivatorFactory, PluginActivator, PluginContext, PluginDescriptor, Plugins};
use crate::service::{
    ServiceFilter, ServiceObject, ServiceReference, ServiceRegistration, Services,
};
use crate::storage::{DirectoryStorage, PluginStorage};

/// Version reported by the system plugin.
const FRAMEWORK_VERSION: &str = env!("CARGO_PKG_VERSION");

struct Registries {
    plugins: Plugins,
    services: Arc<Services>,
}

#[derive(Default)]
struct Lifecycle {
    initialized: bool,
    /// Set by the first successful `init`.
    ever_initialized: bool,
    /// The first `init` created the storage area; `uninit` deletes it.
    purge_on_uninit: bool,
}

pub(crate) struct FrameworkInner {
    id: FrameworkId,
    config: FrameworkConfig,
    storage: Arc<dyn PluginStorage>,
    listeners: Arc<Listeners>,
    catalog: RwLock<HashMap<String, ActivatorFactory>>,
    plugin_configs: HashMap<String, Value>,
    lifecycle: Mutex<Lifecycle>,
    registries: RwLock<Option<Arc<Registries>>>,
}

/// Handle to one framework instance.
#[derive(Clone)]
pub struct FrameworkContext {
    inner: Arc<FrameworkInner>,
}

// =============================================================================
// Builder
// =============================================================================

/// Builds a [`FrameworkContext`].
///
/// Without an explicit storage, a [`DirectoryStorage`] rooted at the
/// configured `storage_dir` is used.  Without an explicit allocator, the id
/// comes from [`FrameworkIdAllocator::process`].
#[derive(Default)]
pub struct FrameworkBuilder {
    config: FrameworkConfig,
    storage: Option<Arc<dyn PluginStorage>>,
    ids: Option<FrameworkIdAllocator>,
    plugin_configs: HashMap<String, Value>,
}

impl FrameworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: FrameworkConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `storage` instead of a directory storage.
    pub fn storage(mut self, storage: Arc<dyn PluginStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn id_allocator(mut self, ids: FrameworkIdAllocator) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Per-plugin configuration sections, keyed by symbolic name.
    pub fn plugin_configs(mut self, configs: HashMap<String, Value>) -> Self {
        self.plugin_configs = configs;
        self
    }

    pub fn build(self) -> FrameworkContext {
        let id = self.ids.unwrap_or_else(FrameworkIdAllocator::process).allocate();
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(DirectoryStorage::new(self.config.storage_dir.clone())));
        debug!(framework = %id, storage_dir = %self.config.storage_dir.display(), "Framework created");
        FrameworkContext {
            inner: Arc::new(FrameworkInner {
                id,
                config: self.config,
                storage,
                listeners: Arc::new(Listeners::new(id)),
                catalog: RwLock::new(HashMap::new()),
                plugin_configs: self.plugin_configs,
                lifecycle: Mutex::new(Lifecycle::default()),
                registries: RwLock::new(None),
            }),
        }
    }
}

impl FrameworkContext {
    /// A framework over `config` with a directory storage and a
    /// process-wide id.
    pub fn new(config: FrameworkConfig) -> Self {
        FrameworkBuilder::new().config(config).build()
    }

    pub fn builder() -> FrameworkBuilder {
        FrameworkBuilder::new()
    }

    pub(crate) fn from_inner(inner: Arc<FrameworkInner>) -> Self {
        Self { inner }
    }

    /// Process-unique id of this instance.
    pub fn id(&self) -> FrameworkId {
        self.inner.id
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.inner.config
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.registries.read().is_some()
    }

    fn registries(&self) -> FrameworkResult<Arc<Registries>> {
        self.inner
            .registries
            .read()
            .clone()
            .ok_or(FrameworkError::NotInitialized(self.inner.id))
    }

    fn plugin_ref(&self, id: PluginId) -> PluginRef {
        PluginRef::new(self.inner.id, id)
    }

    fn publish_framework(&self, event: FrameworkEvent) {
        self.inner.listeners.publish(&Event::Framework(event));
    }

    fn report_error(&self, plugin: Option<PluginId>, message: String) {
        self.publish_framework(FrameworkEvent::Error {
            framework: self.inner.id,
            plugin,
            message,
        });
    }

    // =========================================================================
    // Init / uninit
    // =========================================================================

    /// Opens the storage, loads persisted plugins and builds the registries.
    /// Does nothing when already initialized.
    pub fn init(&self) -> FrameworkResult<()> {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle.lock();
        if lifecycle.initialized {
            return Ok(());
        }

        let fresh = inner.storage.open()?;
        let first = !lifecycle.ever_initialized;
        let records = match self.load_records(first, fresh) {
            Ok(records) => records,
            Err(e) => {
                if let Err(close) = inner.storage.close(false) {
                    warn!(framework = %inner.id, error = %close, "Failed to release storage");
                }
                return Err(e);
            }
        };

        let services = Arc::new(Services::new(inner.id));
        let plugins = Plugins::new(
            inner.id,
            inner.storage.clone(),
            services.clone(),
            inner.listeners.clone(),
            inner.config.duplicates,
        );
        let version = Version::parse(FRAMEWORK_VERSION).unwrap_or_else(|_| Version::new(0, 0, 0));
        plugins.install_system(version);
        let loaded = records.len();
        plugins.load(records);
        *inner.registries.write() = Some(Arc::new(Registries { plugins, services }));

        if first {
            lifecycle.purge_on_uninit = fresh && inner.config.cleanup_fresh_storage;
        }
        lifecycle.initialized = true;
        lifecycle.ever_initialized = true;

        info!(framework = %inner.id, plugins = loaded, fresh, "Framework initialized");
        Ok(())
    }

    fn load_records(&self, first: bool, fresh: bool) -> FrameworkResult<Vec<PluginRecord>> {
        let storage = &self.inner.storage;
        if first && !fresh && self.inner.config.clean_on_first_init {
            let stale = storage.list_installed()?;
            info!(framework = %self.inner.id, plugins = stale.len(), "Cleaning plugin storage");
            for record in stale {
                storage.remove(record.id)?;
            }
        }
        Ok(storage.list_installed()?)
    }

    /// Stops active plugins, drops the registries and releases the storage.
    /// Does nothing when not initialized.
    ///
    /// Stop failures are logged and do not interrupt the teardown.  Stopping
    /// here is transient: auto-start flags are left as they are.
    pub fn uninit(&self) -> FrameworkResult<()> {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle.lock();
        if !lifecycle.initialized {
            return Ok(());
        }

        let registries = inner.registries.read().clone();
        if let Some(registries) = registries {
            for id in registries.plugins.active_ids_desc() {
                if let Err(e) = self.stop_with(&registries, id, false) {
                    warn!(framework = %inner.id, plugin_id = %id, error = %e, "Failed to stop plugin during uninit");
                }
            }
            registries.services.clear();
            registries.plugins.clear();
        }
        *inner.registries.write() = None;
        lifecycle.initialized = false;

        let purge = lifecycle.purge_on_uninit;
        inner.storage.close(purge)?;
        info!(framework = %inner.id, purged = purge, "Framework uninitialized");
        Ok(())
    }

    /// `init`, then start every plugin flagged for auto-start.
    pub fn launch(&self) -> FrameworkResult<()> {
        self.init()?;
        let registries = self.registries()?;
        for id in registries.plugins.auto_start_ids() {
            if let Err(e) = self.start_plugin(self.plugin_ref(id)) {
                error!(framework = %self.inner.id, plugin_id = %id, error = %e, "Failed to auto-start plugin");
            }
        }
        self.publish_framework(FrameworkEvent::Started {
            framework: self.inner.id,
        });
        Ok(())
    }

    /// Announces the shutdown, runs `uninit` and announces its end.
    pub fn shutdown(&self) -> FrameworkResult<()> {
        let framework = self.inner.id;
        self.publish_framework(FrameworkEvent::Stopping { framework });
        let result = self.uninit();
        self.publish_framework(FrameworkEvent::Stopped { framework });
        result
    }

    // =========================================================================
    // Plugin operations
    // =========================================================================

    /// Fails unless `plugin` was issued by this framework.
    pub fn check_our_plugin(&self, plugin: PluginRef) -> FrameworkResult<()> {
        if plugin.framework == self.inner.id {
            Ok(())
        } else {
            Err(FrameworkError::Ownership {
                plugin: plugin.id,
                owner: plugin.framework,
                expected: self.inner.id,
            })
        }
    }

    /// The private data directory of `plugin`, created if absent.
    ///
    /// Needs an initialized framework and an installed plugin, so the
    /// storage area is never touched outside `init` .. `uninit`.
    pub fn data_storage(&self, plugin: PluginRef) -> FrameworkResult<PathBuf> {
        self.check_our_plugin(plugin)?;
        self.registries()?.plugins.require(plugin.id)?;
        Ok(self.inner.storage.data_dir_for(plugin.id)?)
    }

    /// Handle of the system plugin.
    pub fn system_plugin(&self) -> PluginRef {
        self.plugin_ref(PluginId::SYSTEM)
    }

    /// Registers an activator factory for plugins named `name` that have no
    /// factory of their own, such as plugins reloaded from storage.
    pub fn register_activator<A, F>(&self, name: impl Into<String>, create: F)
    where
        A: PluginActivator,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let factory: ActivatorFactory =
            Arc::new(move || Box::new(create()) as Box<dyn PluginActivator>);
        self.inner.catalog.write().insert(name.into(), factory);
    }

    pub fn install(&self, descriptor: PluginDescriptor) -> FrameworkResult<PluginRef> {
        let info = self.registries()?.plugins.install(descriptor)?;
        Ok(self.plugin_ref(info.id))
    }

    /// Resolves `plugin` and everything it requires.
    ///
    /// Already resolved plugins are left alone.  On failure no plugin
    /// changes state.
    pub fn resolve_plugin(&self, plugin: PluginRef) -> FrameworkResult<()> {
        self.check_our_plugin(plugin)?;
        self.registries()?.plugins.resolve(plugin.id)
    }

    /// Starts `plugin`, resolving it first when needed, and marks it for
    /// auto-start.  Starting an active plugin does nothing.
    pub fn start_plugin(&self, plugin: PluginRef) -> FrameworkResult<()> {
        self.check_our_plugin(plugin)?;
        let registries = self.registries()?;
        let plugins = &registries.plugins;
        let id = plugin.id;

        let Some(ticket) = plugins.begin_start(id)? else {
            return plugins.set_auto_start(id, true);
        };
        if let Err(e) = plugins.set_auto_start(id, true) {
            plugins.finish_start(id, None, false)?;
            return Err(e);
        }

        let name = ticket.info.name.clone();
        let factory = ticket
            .factory
            .or_else(|| self.inner.catalog.read().get(&name).cloned());
        let ctx = self.plugin_context(&ticket.info);

        let started = guarded(|| {
            let Some(factory) = factory else {
                return Ok(None);
            };
            let activator: Arc<dyn PluginActivator> = Arc::from(factory());
            activator.start(&ctx)?;
            Ok(Some(activator))
        });

        match started {
            Ok(activator) => {
                if let Err(e) = plugins.finish_start(id, activator.clone(), true) {
                    // A concurrent `uninit` cleared the table; undo the start.
                    warn!(framework = %self.inner.id, plugin_id = %id, plugin = %name, error = %e, "Plugin started but could not become active");
                    if let Some(activator) = activator
                        && let Err(stop) = guarded(|| activator.stop(&ctx))
                    {
                        error!(framework = %self.inner.id, plugin_id = %id, plugin = %name, error = %stop, "Plugin failed to stop cleanly");
                    }
                    return Err(e);
                }
                info!(framework = %self.inner.id, plugin_id = %id, plugin = %name, "Plugin started");
                Ok(())
            }
            Err(source) => {
                error!(framework = %self.inner.id, plugin_id = %id, plugin = %name, error = %source, "Plugin failed to start");
                plugins.finish_start(id, None, false)?;
                self.report_error(Some(id), format!("start of '{name}' failed: {source}"));
                Err(FrameworkError::Activator {
                    plugin: id,
                    name,
                    source,
                })
            }
        }
    }

    /// Stops `plugin` and clears its auto-start flag.  Stopping a plugin
    /// that is not running does nothing.
    pub fn stop_plugin(&self, plugin: PluginRef) -> FrameworkResult<()> {
        self.check_our_plugin(plugin)?;
        let registries = self.registries()?;
        self.stop_with(&registries, plugin.id, true)
    }

    fn stop_with(&self, registries: &Registries, id: PluginId, persistent: bool) -> FrameworkResult<()> {
        let plugins = &registries.plugins;
        if persistent {
            plugins.set_auto_start(id, false)?;
        }
        let Some(ticket) = plugins.begin_stop(id)? else {
            return Ok(());
        };

        let name = ticket.info.name.clone();
        let stopped = match &ticket.activator {
            Some(activator) => {
                let ctx = self.plugin_context(&ticket.info);
                guarded(|| activator.stop(&ctx))
            }
            None => Ok(()),
        };
        plugins.finish_stop(id)?;

        match stopped {
            Ok(()) => {
                info!(framework = %self.inner.id, plugin_id = %id, plugin = %name, "Plugin stopped");
                Ok(())
            }
            Err(source) => {
                error!(framework = %self.inner.id, plugin_id = %id, plugin = %name, error = %source, "Plugin failed to stop cleanly");
                self.report_error(Some(id), format!("stop of '{name}' failed: {source}"));
                Err(FrameworkError::Activator {
                    plugin: id,
                    name,
                    source,
                })
            }
        }
    }

    /// Uninstalls `plugin`, stopping it first when it is active.
    ///
    /// Its record and data directory are deleted and its handle becomes
    /// stale: lookups return nothing.
    pub fn uninstall_plugin(&self, plugin: PluginRef) -> FrameworkResult<()> {
        self.check_our_plugin(plugin)?;
        let registries = self.registries()?;
        if registries.plugins.state(plugin.id) == Some(PluginState::Active)
            && let Err(e) = self.stop_with(&registries, plugin.id, false)
        {
            warn!(framework = %self.inner.id, plugin_id = %plugin.id, error = %e, "Stop before uninstall failed");
        }
        registries.plugins.uninstall(plugin.id)
    }

    /// Snapshot of one plugin.
    pub fn plugin(&self, id: PluginId) -> Option<PluginInfo> {
        self.registries().ok()?.plugins.lookup(id)
    }

    /// Snapshots of every installed plugin, by id.
    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.registries()
            .map(|r| r.plugins.all())
            .unwrap_or_default()
    }

    /// Installed plugins named `name` with a version in `range`.
    pub fn plugins_by_name(&self, name: &str, range: &VersionReq) -> Vec<PluginInfo> {
        self.registries()
            .map(|r| r.plugins.lookup_by_name(name, range))
            .unwrap_or_default()
    }

    fn plugin_context(&self, info: &PluginInfo) -> PluginContext {
        let config = self
            .inner
            .plugin_configs
            .get(&info.name)
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        PluginContext::new(
            self.plugin_ref(info.id),
            info.name.clone(),
            Arc::new(config),
            Arc::downgrade(&self.inner),
        )
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// Publishes `instance` under `interface` on behalf of `owner`, which
    /// must be starting or active.
    ///
    /// ```rust,ignore
    /// let reg = framework.register_service(
    ///     framework.system_plugin(),
    ///     "greeting",
    ///     Arc::new(String::from("hello")),
    ///     Properties::new(),
    /// )?;
    /// ```
    pub fn register_service(
        &self,
        owner: PluginRef,
        interface: &str,
        instance: ServiceObject,
        properties: Properties,
    ) -> FrameworkResult<ServiceRegistration> {
        self.check_our_plugin(owner)?;
        self.registries()?
            .plugins
            .register_service(owner.id, interface, instance, properties)
    }

    fn check_our_service(&self, registration: &ServiceRegistration) -> FrameworkResult<()> {
        self.check_our_plugin(PluginRef::new(registration.framework, registration.owner))
    }

    /// Removes a registration. The second call fails with
    /// `AlreadyUnregistered`.
    pub fn unregister_service(&self, registration: &ServiceRegistration) -> FrameworkResult<()> {
        self.check_our_service(registration)?;
        let event = self.registries()?.services.remove(registration)?;
        self.inner.listeners.publish(&Event::Service(event));
        Ok(())
    }

    /// Replaces the properties of a registration.
    pub fn set_service_properties(
        &self,
        registration: &ServiceRegistration,
        properties: Properties,
    ) -> FrameworkResult<()> {
        self.check_our_service(registration)?;
        let event = self
            .registries()?
            .services
            .set_properties(registration, properties)?;
        self.inner.listeners.publish(&Event::Service(event));
        Ok(())
    }

    /// Services under `interface` that pass `filter`, best ranked first.
    pub fn find_services(
        &self,
        interface: &str,
        filter: Option<&ServiceFilter>,
    ) -> Vec<ServiceReference> {
        self.registries()
            .map(|r| r.services.find(interface, filter))
            .unwrap_or_default()
    }

    /// Like [`find_services`](Self::find_services) with a filter string.
    pub fn find_services_matching(
        &self,
        interface: &str,
        filter: &str,
    ) -> FrameworkResult<Vec<ServiceReference>> {
        let filter: ServiceFilter = filter.parse()?;
        Ok(self.find_services(interface, Some(&filter)))
    }

    /// The best-ranked service under `interface`, as `T`.
    pub fn service<T: std::any::Any + Send + Sync>(&self, interface: &str) -> Option<Arc<T>> {
        self.find_services(interface, None).first()?.get::<T>()
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> ListenerToken
    where
        F: Fn(&Event) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(kind, callback)
    }

    pub fn unsubscribe(&self, token: ListenerToken) -> bool {
        self.inner.listeners.unsubscribe(token)
    }
}

impl std::fmt::Debug for FrameworkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameworkContext")
            .field("id", &self.inner.id)
            .field("storage_dir", &self.inner.config.storage_dir)
            .finish_non_exhaustive()
    }
}

impl Drop for FrameworkInner {
    fn drop(&mut self) {
        if self.lifecycle.get_mut().initialized {
            debug!(framework = %self.id, "Framework dropped while initialized; releasing storage");
            if let Err(e) = self.storage.close(false) {
                warn!(framework = %self.id, error = %e, "Failed to release storage");
            }
        }
    }
}
