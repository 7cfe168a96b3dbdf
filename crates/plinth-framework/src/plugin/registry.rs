//! The plugin table: identity, lifecycle state and persistence.
//!
//! [`Plugins`] is the single source of truth for plugin state.  Every
//! mutation runs under one mutex and collects the events it causes; the
//! events are published after the lock is released, so listeners may call
//! back into the framework.
//!
//! Leaving a service-owning state (STARTING or ACTIVE) removes the plugin's
//! services, newest first, and their `Unregistered` events are queued ahead
//! of the lifecycle event of that transition.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use plinth_core::{
    Event, FrameworkError, FrameworkId, FrameworkResult, PluginEvent, PluginEventKind, PluginId,
    PluginInfo, PluginRecord, PluginState, Properties, Version, VersionReq,
};

use crate::config::DuplicatePolicy;
use crate::listeners::Listeners;
use crate::resolver::{self, View};
use crate::service::{ServiceObject, ServiceRegistration, Services};
use crate::storage::PluginStorage;

use super::activator::{ActivatorFactory, PluginActivator};
use super::descriptor::PluginDescriptor;

/// Symbolic name of the system plugin.
pub const SYSTEM_PLUGIN_NAME: &str = "plinth.framework";

struct PluginEntry {
    record: PluginRecord,
    state: PluginState,
    /// From the descriptor; absent for plugins reloaded from storage.
    factory: Option<ActivatorFactory>,
    /// Live between a successful start and the matching stop.
    activator: Option<Arc<dyn PluginActivator>>,
}

struct PluginTable {
    entries: BTreeMap<PluginId, PluginEntry>,
    /// Names of uninstalled plugins, for errors on their stale handles.
    uninstalled: BTreeMap<PluginId, String>,
    next_id: u64,
    /// Set once the owning framework has been uninitialized.
    closed: bool,
}

impl PluginTable {
    fn view(&self) -> View<'_> {
        self.entries
            .iter()
            .map(|(id, e)| (*id, (&e.record, e.state)))
            .collect()
    }

    fn info(&self, id: PluginId) -> Option<PluginInfo> {
        self.entries
            .get(&id)
            .map(|e| PluginInfo::from_record(&e.record, e.state))
    }
}

/// Handed to the framework context when a start begins.
pub(crate) struct StartTicket {
    pub info: PluginInfo,
    pub factory: Option<ActivatorFactory>,
}

/// Handed to the framework context when a stop begins.
pub(crate) struct StopTicket {
    pub info: PluginInfo,
    pub activator: Option<Arc<dyn PluginActivator>>,
}

/// Plugin registry of one framework instance.
pub struct Plugins {
    framework: FrameworkId,
    table: Mutex<PluginTable>,
    storage: Arc<dyn PluginStorage>,
    services: Arc<Services>,
    listeners: Arc<Listeners>,
    duplicates: DuplicatePolicy,
}

impl Plugins {
    pub(crate) fn new(
        framework: FrameworkId,
        storage: Arc<dyn PluginStorage>,
        services: Arc<Services>,
        listeners: Arc<Listeners>,
        duplicates: DuplicatePolicy,
    ) -> Self {
        Self {
            framework,
            table: Mutex::new(PluginTable {
                entries: BTreeMap::new(),
                uninstalled: BTreeMap::new(),
                next_id: 1,
                closed: false,
            }),
            storage,
            services,
            listeners,
            duplicates,
        }
    }

    // =========================================================================
    // Population
    // =========================================================================

    /// Adds the always-active system plugin under id 0.
    pub(crate) fn install_system(&self, version: Version) {
        let record = PluginRecord {
            id: PluginId::SYSTEM,
            name: SYSTEM_PLUGIN_NAME.to_string(),
            version,
            requirements: Vec::new(),
            location: None,
            auto_start: false,
        };
        self.table.lock().entries.insert(
            PluginId::SYSTEM,
            PluginEntry {
                record,
                state: PluginState::Active,
                factory: None,
                activator: None,
            },
        );
    }

    /// Restores persisted plugins as INSTALLED. No events are published.
    pub(crate) fn load(&self, records: Vec<PluginRecord>) {
        let mut table = self.table.lock();
        for record in records {
            if record.id.is_system() {
                warn!(framework = %self.framework, plugin = %record.name, "Ignoring persisted record with the system plugin id");
                continue;
            }
            debug!(
                framework = %self.framework,
                plugin_id = %record.id,
                plugin = %record.name,
                version = %record.version,
                "Plugin loaded from storage"
            );
            table.next_id = table.next_id.max(record.id.0 + 1);
            table.entries.insert(
                record.id,
                PluginEntry {
                    record,
                    state: PluginState::Installed,
                    factory: None,
                    activator: None,
                },
            );
        }
    }

    /// Installs a plugin: new id, INSTALLED, persisted.
    pub fn install(&self, descriptor: PluginDescriptor) -> FrameworkResult<PluginInfo> {
        let mut table = self.table.lock();
        if table.closed {
            return Err(FrameworkError::NotInitialized(self.framework));
        }

        if self.duplicates == DuplicatePolicy::Reject
            && let Some(existing) = table.entries.values().find(|e| {
                e.record.name == descriptor.name && e.record.version == descriptor.version
            })
        {
            return Err(FrameworkError::DuplicateInstall {
                name: descriptor.name,
                version: descriptor.version,
                existing: existing.record.id,
            });
        }

        let id = PluginId(table.next_id);
        let (record, factory) = descriptor.into_record(id);
        self.storage.persist(&record)?;
        table.next_id += 1;

        let info = PluginInfo::from_record(&record, PluginState::Installed);
        let event = self.plugin_event(PluginEventKind::Installed, &record);
        table.entries.insert(
            id,
            PluginEntry {
                record,
                state: PluginState::Installed,
                factory,
                activator: None,
            },
        );
        drop(table);

        info!(
            framework = %self.framework,
            plugin_id = %id,
            plugin = %info.name,
            version = %info.version,
            "Plugin installed"
        );
        self.listeners.publish(&event);
        Ok(info)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn lookup(&self, id: PluginId) -> Option<PluginInfo> {
        self.table.lock().info(id)
    }

    /// Like [`Plugins::lookup`], with the error an operation on a missing
    /// id reports.
    pub(crate) fn require(&self, id: PluginId) -> FrameworkResult<PluginInfo> {
        let table = self.table.lock();
        table.info(id).ok_or_else(|| self.missing(&table, id, PluginState::Active))
    }

    /// Installed plugins called `name` whose version is in `range`, by id.
    pub fn lookup_by_name(&self, name: &str, range: &VersionReq) -> Vec<PluginInfo> {
        self.table
            .lock()
            .entries
            .values()
            .filter(|e| e.record.name == name && range.matches(&e.record.version))
            .map(|e| PluginInfo::from_record(&e.record, e.state))
            .collect()
    }

    pub fn all(&self) -> Vec<PluginInfo> {
        self.table
            .lock()
            .entries
            .values()
            .map(|e| PluginInfo::from_record(&e.record, e.state))
            .collect()
    }

    pub fn state(&self, id: PluginId) -> Option<PluginState> {
        self.table.lock().entries.get(&id).map(|e| e.state)
    }

    /// Active plugins other than the system plugin, newest first.
    pub(crate) fn active_ids_desc(&self) -> Vec<PluginId> {
        self.table
            .lock()
            .entries
            .iter()
            .rev()
            .filter(|(id, e)| !id.is_system() && e.state == PluginState::Active)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Plugins flagged for auto-start, by id.
    pub(crate) fn auto_start_ids(&self) -> Vec<PluginId> {
        self.table
            .lock()
            .entries
            .iter()
            .filter(|(_, e)| e.record.auto_start)
            .map(|(id, _)| *id)
            .collect()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Moves a plugin along one edge of the lifecycle machine.
    pub fn transition(&self, id: PluginId, to: PluginState) -> FrameworkResult<()> {
        let mut events = Vec::new();
        let result = {
            let mut table = self.table.lock();
            self.transition_locked(&mut table, id, to, &mut events)
        };
        self.listeners.publish_all(events);
        result
    }

    /// Resolves `id` and everything it requires, or changes nothing.
    pub fn resolve(&self, id: PluginId) -> FrameworkResult<()> {
        let mut events = Vec::new();
        let result = {
            let mut table = self.table.lock();
            self.resolve_locked(&mut table, id, &mut events)
        };
        self.listeners.publish_all(events);
        result
    }

    fn resolve_locked(
        &self,
        table: &mut PluginTable,
        id: PluginId,
        events: &mut Vec<Event>,
    ) -> FrameworkResult<()> {
        if !table.entries.contains_key(&id) {
            return Err(self.missing(table, id, PluginState::Resolved));
        }
        let plan = resolver::plan(&table.view(), id)?;
        if plan.is_empty() {
            return Ok(());
        }
        for planned in &plan {
            self.transition_locked(table, *planned, PluginState::Resolved, events)?;
        }
        info!(
            framework = %self.framework,
            plugin_id = %id,
            resolved = plan.len(),
            "Plugin resolved"
        );
        Ok(())
    }

    /// Removes an INSTALLED or RESOLVED plugin and its persisted data.
    pub fn uninstall(&self, id: PluginId) -> FrameworkResult<()> {
        let mut events = Vec::new();
        let result = {
            let mut table = self.table.lock();
            self.uninstall_locked(&mut table, id, &mut events)
        };
        self.listeners.publish_all(events);
        result
    }

    fn uninstall_locked(
        &self,
        table: &mut PluginTable,
        id: PluginId,
        events: &mut Vec<Event>,
    ) -> FrameworkResult<()> {
        self.reject_system(table, id, PluginState::Uninstalled)?;
        let entry = table
            .entries
            .get(&id)
            .ok_or_else(|| self.missing(table, id, PluginState::Uninstalled))?;
        if !matches!(entry.state, PluginState::Installed | PluginState::Resolved) {
            return Err(FrameworkError::IllegalStateTransition {
                plugin: id,
                name: entry.record.name.clone(),
                from: entry.state,
                to: PluginState::Uninstalled,
            });
        }
        let name = entry.record.name.clone();
        self.storage.remove(id)?;
        self.transition_locked(table, id, PluginState::Uninstalled, events)?;
        info!(framework = %self.framework, plugin_id = %id, plugin = %name, "Plugin uninstalled");
        Ok(())
    }

    /// Persists a changed auto-start flag.
    pub(crate) fn set_auto_start(&self, id: PluginId, auto_start: bool) -> FrameworkResult<()> {
        let mut table = self.table.lock();
        let Some(entry) = table.entries.get_mut(&id) else {
            return Ok(());
        };
        if id.is_system() || entry.record.auto_start == auto_start {
            return Ok(());
        }
        let mut record = entry.record.clone();
        record.auto_start = auto_start;
        self.storage.persist(&record)?;
        entry.record = record;
        Ok(())
    }

    /// RESOLVED -> STARTING, resolving an INSTALLED plugin first. `None`
    /// when the plugin is already ACTIVE.
    pub(crate) fn begin_start(&self, id: PluginId) -> FrameworkResult<Option<StartTicket>> {
        let mut events = Vec::new();
        let result = {
            let mut table = self.table.lock();
            self.begin_start_locked(&mut table, id, &mut events)
        };
        self.listeners.publish_all(events);
        result
    }

    fn begin_start_locked(
        &self,
        table: &mut PluginTable,
        id: PluginId,
        events: &mut Vec<Event>,
    ) -> FrameworkResult<Option<StartTicket>> {
        self.reject_system(table, id, PluginState::Starting)?;
        match table.entries.get(&id).map(|e| e.state) {
            None => return Err(self.missing(table, id, PluginState::Starting)),
            Some(PluginState::Active) => return Ok(None),
            Some(PluginState::Installed) => self.resolve_locked(table, id, events)?,
            Some(_) => {}
        }
        self.transition_locked(table, id, PluginState::Starting, events)?;
        let entry = table
            .entries
            .get(&id)
            .ok_or(FrameworkError::UnknownPlugin(id))?;
        Ok(Some(StartTicket {
            info: PluginInfo::from_record(&entry.record, entry.state),
            factory: entry.factory.clone(),
        }))
    }

    /// STARTING -> ACTIVE on success, STARTING -> RESOLVED on failure.
    pub(crate) fn finish_start(
        &self,
        id: PluginId,
        activator: Option<Arc<dyn PluginActivator>>,
        succeeded: bool,
    ) -> FrameworkResult<()> {
        let mut events = Vec::new();
        let result = {
            let mut table = self.table.lock();
            let to = if succeeded {
                PluginState::Active
            } else {
                PluginState::Resolved
            };
            let outcome = self.transition_locked(&mut table, id, to, &mut events);
            if outcome.is_ok()
                && succeeded
                && let Some(entry) = table.entries.get_mut(&id)
            {
                entry.activator = activator;
            }
            outcome
        };
        self.listeners.publish_all(events);
        result
    }

    /// ACTIVE -> STOPPING, handing back the live activator. `None` when the
    /// plugin is not running.
    pub(crate) fn begin_stop(&self, id: PluginId) -> FrameworkResult<Option<StopTicket>> {
        let mut events = Vec::new();
        let result = {
            let mut table = self.table.lock();
            self.begin_stop_locked(&mut table, id, &mut events)
        };
        self.listeners.publish_all(events);
        result
    }

    fn begin_stop_locked(
        &self,
        table: &mut PluginTable,
        id: PluginId,
        events: &mut Vec<Event>,
    ) -> FrameworkResult<Option<StopTicket>> {
        self.reject_system(table, id, PluginState::Stopping)?;
        match table.entries.get(&id).map(|e| e.state) {
            None => return Err(self.missing(table, id, PluginState::Stopping)),
            Some(PluginState::Installed | PluginState::Resolved) => return Ok(None),
            Some(_) => {}
        }
        self.transition_locked(table, id, PluginState::Stopping, events)?;
        let entry = table
            .entries
            .get_mut(&id)
            .ok_or(FrameworkError::UnknownPlugin(id))?;
        Ok(Some(StopTicket {
            info: PluginInfo::from_record(&entry.record, entry.state),
            activator: entry.activator.take(),
        }))
    }

    /// STOPPING -> RESOLVED.
    pub(crate) fn finish_stop(&self, id: PluginId) -> FrameworkResult<()> {
        self.transition(id, PluginState::Resolved)
    }

    fn transition_locked(
        &self,
        table: &mut PluginTable,
        id: PluginId,
        to: PluginState,
        events: &mut Vec<Event>,
    ) -> FrameworkResult<()> {
        self.reject_system(table, id, to)?;
        let Some(entry) = table.entries.get_mut(&id) else {
            return Err(self.missing(table, id, to));
        };
        let from = entry.state;
        if !from.can_transition_to(to) {
            return Err(FrameworkError::IllegalStateTransition {
                plugin: id,
                name: entry.record.name.clone(),
                from,
                to,
            });
        }

        if from.may_own_services() && !to.may_own_services() {
            events.extend(self.services.remove_owned_by(id).into_iter().map(Event::Service));
        }
        entry.state = to;
        if matches!(to, PluginState::Resolved | PluginState::Uninstalled) {
            entry.activator = None;
        }

        debug!(
            framework = %self.framework,
            plugin_id = %id,
            plugin = %entry.record.name,
            %from,
            %to,
            "Plugin state changed"
        );
        let event = self.plugin_event(PluginEventKind::for_transition(from, to), &entry.record);
        if to == PluginState::Uninstalled {
            let name = entry.record.name.clone();
            table.entries.remove(&id);
            table.uninstalled.insert(id, name);
        }
        events.push(event);
        Ok(())
    }

    fn reject_system(&self, table: &PluginTable, id: PluginId, to: PluginState) -> FrameworkResult<()> {
        if !id.is_system() {
            return Ok(());
        }
        let from = table
            .entries
            .get(&id)
            .map_or(PluginState::Active, |e| e.state);
        Err(FrameworkError::IllegalStateTransition {
            plugin: id,
            name: SYSTEM_PLUGIN_NAME.to_string(),
            from,
            to,
        })
    }

    /// Error for an id with no entry.  After `clear` every id is gone with
    /// the framework; before it, uninstalled ids are stale handles.
    fn missing(&self, table: &PluginTable, id: PluginId, to: PluginState) -> FrameworkError {
        if table.closed {
            return FrameworkError::NotInitialized(self.framework);
        }
        match table.uninstalled.get(&id) {
            Some(name) => FrameworkError::IllegalStateTransition {
                plugin: id,
                name: name.clone(),
                from: PluginState::Uninstalled,
                to,
            },
            None => FrameworkError::UnknownPlugin(id),
        }
    }

    fn plugin_event(&self, kind: PluginEventKind, record: &PluginRecord) -> Event {
        Event::Plugin(PluginEvent {
            sequence: self.services.next_sequence(),
            kind,
            framework: self.framework,
            plugin: record.id,
            name: record.name.clone(),
            version: record.version.clone(),
        })
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// Registers a service for `owner`, which must be STARTING or ACTIVE.
    ///
    /// The owner's state is checked and the entry inserted under the plugin
    /// table lock, so a concurrent stop cannot leave a service behind.
    pub(crate) fn register_service(
        &self,
        owner: PluginId,
        interface: &str,
        instance: ServiceObject,
        properties: Properties,
    ) -> FrameworkResult<ServiceRegistration> {
        let (registration, event) = {
            let table = self.table.lock();
            let entry = table
                .entries
                .get(&owner)
                .ok_or_else(|| self.missing(&table, owner, PluginState::Active))?;
            if !entry.state.may_own_services() {
                return Err(FrameworkError::IllegalState {
                    plugin: owner,
                    name: entry.record.name.clone(),
                    state: entry.state,
                    operation: "register services",
                });
            }
            self.services.insert(owner, interface, instance, properties)
        };
        self.listeners.publish(&Event::Service(event));
        Ok(registration)
    }

    /// Drops every entry without publishing anything.  Later operations,
    /// including a start still in flight, fail with `NotInitialized`.
    pub(crate) fn clear(&self) {
        let mut table = self.table.lock();
        table.entries.clear();
        table.closed = true;
    }
}

impl std::fmt::Debug for Plugins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugins")
            .field("framework", &self.framework)
            .field("duplicates", &self.duplicates)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DirectoryStorage;
    use plinth_core::EventKind;

    fn registry(dir: &std::path::Path) -> (Plugins, Arc<Listeners>) {
        let fw = FrameworkId(1);
        let storage = Arc::new(DirectoryStorage::new(dir.join("store")));
        storage.open().unwrap();
        let listeners = Arc::new(Listeners::new(fw));
        let plugins = Plugins::new(
            fw,
            storage,
            Arc::new(Services::new(fw)),
            listeners.clone(),
            DuplicatePolicy::Reject,
        );
        plugins.install_system(Version::new(0, 1, 0));
        (plugins, listeners)
    }

    fn record(id: u64, name: &str, auto_start: bool) -> PluginRecord {
        PluginRecord {
            id: PluginId(id),
            name: name.into(),
            version: Version::new(1, 0, 0),
            requirements: Vec::new(),
            location: None,
            auto_start,
        }
    }

    #[test]
    fn test_load_continues_ids_after_persisted_records() {
        let tmp = tempfile::tempdir().unwrap();
        let (plugins, _) = registry(tmp.path());
        plugins.load(vec![
            record(7, "seven", true),
            record(3, "three", false),
            record(0, "bogus", true),
        ]);

        assert_eq!(
            plugins.lookup(PluginId::SYSTEM).unwrap().name,
            SYSTEM_PLUGIN_NAME
        );
        assert_eq!(plugins.state(PluginId(7)), Some(PluginState::Installed));
        assert_eq!(plugins.auto_start_ids(), vec![PluginId(7)]);

        let next = plugins
            .install(PluginDescriptor::new("late", Version::new(1, 0, 0)))
            .unwrap();
        assert_eq!(next.id, PluginId(8));
    }

    #[test]
    fn test_illegal_edge_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (plugins, _) = registry(tmp.path());
        let p = plugins
            .install(PluginDescriptor::new("p", Version::new(1, 0, 0)))
            .unwrap();

        let err = plugins.transition(p.id, PluginState::Active).unwrap_err();
        assert!(matches!(
            err,
            FrameworkError::IllegalStateTransition {
                from: PluginState::Installed,
                to: PluginState::Active,
                ..
            }
        ));
        assert_eq!(plugins.state(p.id), Some(PluginState::Installed));
    }

    #[test]
    fn test_stale_and_unknown_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let (plugins, _) = registry(tmp.path());
        let p = plugins
            .install(PluginDescriptor::new("p", Version::new(1, 0, 0)))
            .unwrap();
        plugins.uninstall(p.id).unwrap();

        assert!(plugins.lookup(p.id).is_none());
        match plugins.resolve(p.id) {
            Err(FrameworkError::IllegalStateTransition { name, from, .. }) => {
                assert_eq!(name, "p");
                assert_eq!(from, PluginState::Uninstalled);
            }
            other => panic!("unexpected: {other:?}"),
        }
        let err = plugins.require(p.id).unwrap_err();
        assert!(err.to_string().contains("'p'"), "{err}");
        assert!(matches!(
            plugins.resolve(PluginId(99)),
            Err(FrameworkError::UnknownPlugin(PluginId(99)))
        ));
    }

    #[test]
    fn test_cleared_table_reports_not_initialized() {
        let tmp = tempfile::tempdir().unwrap();
        let (plugins, _) = registry(tmp.path());
        let p = plugins
            .install(PluginDescriptor::new("p", Version::new(1, 0, 0)))
            .unwrap();
        plugins.begin_start(p.id).unwrap().unwrap();
        plugins.clear();

        assert!(matches!(
            plugins.finish_start(p.id, None, true),
            Err(FrameworkError::NotInitialized(FrameworkId(1)))
        ));
        assert!(matches!(
            plugins.install(PluginDescriptor::new("q", Version::new(1, 0, 0))),
            Err(FrameworkError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_event_sequence_follows_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let (plugins, listeners) = registry(tmp.path());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Plugin, EventKind::Service] {
            let seen = seen.clone();
            listeners.subscribe(kind, move |e| {
                seen.lock().extend(e.sequence());
                Ok(())
            });
        }

        let p = plugins
            .install(PluginDescriptor::new("p", Version::new(1, 0, 0)))
            .unwrap();
        plugins.begin_start(p.id).unwrap().unwrap();
        plugins
            .register_service(p.id, "a", Arc::new(1u8), Properties::new())
            .unwrap();
        plugins.finish_start(p.id, None, true).unwrap();
        plugins.begin_stop(p.id).unwrap().unwrap();

        // installed, resolved, starting, registered, started, unregistered, stopping
        let seen = seen.lock();
        assert_eq!(seen.len(), 7);
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");
    }

    #[test]
    fn test_leaving_active_queues_service_events_first() {
        let tmp = tempfile::tempdir().unwrap();
        let (plugins, listeners) = registry(tmp.path());
        let order = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Plugin, EventKind::Service] {
            let order = order.clone();
            listeners.subscribe(kind, move |e| {
                order.lock().push(e.kind());
                Ok(())
            });
        }

        let p = plugins
            .install(PluginDescriptor::new("p", Version::new(1, 0, 0)))
            .unwrap();
        plugins.resolve(p.id).unwrap();
        plugins.transition(p.id, PluginState::Starting).unwrap();
        plugins
            .register_service(p.id, "a", Arc::new(1u8), Properties::new())
            .unwrap();
        plugins
            .register_service(p.id, "b", Arc::new(2u8), Properties::new())
            .unwrap();
        plugins.transition(p.id, PluginState::Active).unwrap();
        order.lock().clear();

        plugins.transition(p.id, PluginState::Stopping).unwrap();
        assert_eq!(
            *order.lock(),
            vec![EventKind::Service, EventKind::Service, EventKind::Plugin]
        );
        assert!(matches!(
            plugins.register_service(p.id, "c", Arc::new(3u8), Properties::new()),
            Err(FrameworkError::IllegalState {
                state: PluginState::Stopping,
                ..
            })
        ));
    }

    #[test]
    fn test_system_plugin_is_fixed() {
        let tmp = tempfile::tempdir().unwrap();
        let (plugins, _) = registry(tmp.path());
        assert!(plugins.uninstall(PluginId::SYSTEM).is_err());
        assert!(
            plugins
                .transition(PluginId::SYSTEM, PluginState::Stopping)
                .is_err()
        );
        assert_eq!(plugins.state(PluginId::SYSTEM), Some(PluginState::Active));
    }
}
