//! The service table of one framework instance.
//!
//! [`Services`] only stores and indexes entries.  Whether an owner may
//! register is decided by the plugin registry, which holds the plugin table
//! lock while calling [`Services::insert`]; that is the only lock order the
//! two tables are ever taken in.
//!
//! The table also hands out the event sequence numbers of its instance.
//! Each one is taken while the change it describes is applied, under the
//! lock that guards that change.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, trace};

use plinth_core::{
    FrameworkError, FrameworkId, FrameworkResult, OBJECT_CLASS, PluginId, Properties, SERVICE_ID,
    ServiceEvent, ServiceEventKind, ServiceId, ServiceInfo, ranking_of,
};

use super::filter::ServiceFilter;
use super::reference::{ServiceObject, ServiceReference, ServiceRegistration};

struct ServiceEntry {
    info: ServiceInfo,
    instance: ServiceObject,
}

#[derive(Default)]
struct ServiceTable {
    /// Keyed by id, so iteration is registration order.
    entries: BTreeMap<ServiceId, ServiceEntry>,
    next_id: u64,
}

/// Concurrency-safe service table.
pub struct Services {
    framework: FrameworkId,
    table: RwLock<ServiceTable>,
    sequence: AtomicU64,
}

fn with_standard_properties(mut properties: Properties, id: ServiceId, interface: &str) -> Properties {
    properties.insert(SERVICE_ID.to_string(), Value::from(id.0));
    properties.insert(OBJECT_CLASS.to_string(), Value::from(interface));
    properties
}

impl Services {
    pub fn new(framework: FrameworkId) -> Self {
        Self {
            framework,
            table: RwLock::new(ServiceTable {
                entries: BTreeMap::new(),
                next_id: 1,
            }),
            sequence: AtomicU64::new(1),
        }
    }

    /// Next event sequence number of this instance.
    pub(crate) fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn event(&self, kind: ServiceEventKind, info: ServiceInfo) -> ServiceEvent {
        ServiceEvent {
            sequence: self.next_sequence(),
            kind,
            framework: self.framework,
            service: info,
        }
    }

    /// Adds an entry. The caller has already checked the owner's state.
    pub(crate) fn insert(
        &self,
        owner: PluginId,
        interface: &str,
        instance: ServiceObject,
        properties: Properties,
    ) -> (ServiceRegistration, ServiceEvent) {
        let mut table = self.table.write();
        let id = ServiceId(table.next_id);
        table.next_id += 1;

        let info = ServiceInfo {
            id,
            owner,
            interface: interface.to_string(),
            properties: with_standard_properties(properties, id, interface),
        };
        let event = self.event(ServiceEventKind::Registered, info.clone());
        table.entries.insert(id, ServiceEntry { info, instance });
        drop(table);

        debug!(
            framework = %self.framework,
            service_id = %id,
            plugin_id = %owner,
            interface,
            "Service registered"
        );
        let registration = ServiceRegistration {
            framework: self.framework,
            id,
            owner,
            interface: interface.to_string(),
        };
        (registration, event)
    }

    /// Removes an entry; fails if it is already gone.
    pub(crate) fn remove(&self, registration: &ServiceRegistration) -> FrameworkResult<ServiceEvent> {
        let (_entry, event) = {
            let mut table = self.table.write();
            let entry = table
                .entries
                .remove(&registration.id)
                .ok_or(FrameworkError::AlreadyUnregistered(registration.id))?;
            let event = self.event(ServiceEventKind::Unregistered, entry.info.clone());
            (entry, event)
        };
        debug!(
            framework = %self.framework,
            service_id = %registration.id,
            interface = %registration.interface,
            "Service unregistered"
        );
        Ok(event)
    }

    /// Replaces the user properties of an entry, keeping the standard ones.
    pub(crate) fn set_properties(
        &self,
        registration: &ServiceRegistration,
        properties: Properties,
    ) -> FrameworkResult<ServiceEvent> {
        let mut table = self.table.write();
        let entry = table
            .entries
            .get_mut(&registration.id)
            .ok_or(FrameworkError::AlreadyUnregistered(registration.id))?;
        entry.info.properties =
            with_standard_properties(properties, registration.id, &registration.interface);
        let event = self.event(ServiceEventKind::Modified, entry.info.clone());
        drop(table);

        trace!(framework = %self.framework, service_id = %registration.id, "Service modified");
        Ok(event)
    }

    /// Removes everything `owner` registered, newest first.
    pub(crate) fn remove_owned_by(&self, owner: PluginId) -> Vec<ServiceEvent> {
        // Instances are released after the lock.
        let (_entries, events): (Vec<ServiceEntry>, Vec<ServiceEvent>) = {
            let mut table = self.table.write();
            let ids: Vec<ServiceId> = table
                .entries
                .iter()
                .rev()
                .filter(|(_, e)| e.info.owner == owner)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| table.entries.remove(&id))
                .map(|e| {
                    let event = self.event(ServiceEventKind::Unregistered, e.info.clone());
                    (e, event)
                })
                .unzip()
        };

        if !events.is_empty() {
            debug!(
                framework = %self.framework,
                plugin_id = %owner,
                count = events.len(),
                "Unregistered services of plugin"
            );
        }
        events
    }

    /// Services published under `interface` that pass `filter`, by
    /// descending ranking and then registration order.
    pub fn find(&self, interface: &str, filter: Option<&ServiceFilter>) -> Vec<ServiceReference> {
        let mut found: Vec<ServiceReference> = self
            .table
            .read()
            .entries
            .values()
            .filter(|e| e.info.interface == interface)
            .filter(|e| filter.is_none_or(|f| f.matches(&e.info.properties)))
            .map(|e| ServiceReference::new(e.info.clone(), e.instance.clone()))
            .collect();
        // Stable sort keeps registration order among equal rankings.
        found.sort_by_key(|r| std::cmp::Reverse(ranking_of(r.properties())));
        found
    }

    /// Metadata of every service `owner` currently has registered.
    pub fn owned_by(&self, owner: PluginId) -> Vec<ServiceInfo> {
        self.table
            .read()
            .entries
            .values()
            .filter(|e| e.info.owner == owner)
            .map(|e| e.info.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry without publishing anything.
    pub(crate) fn clear(&self) {
        self.table.write().entries.clear();
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("framework", &self.framework)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn props(ranking: i64) -> Properties {
        let mut p = Properties::new();
        p.insert("service.ranking".into(), json!(ranking));
        p
    }

    #[test]
    fn test_find_orders_by_ranking_then_registration() {
        let services = Services::new(FrameworkId(1));
        let (low, _) = services.insert(PluginId(1), "codec", Arc::new(1u32), props(0));
        let (high, _) = services.insert(PluginId(2), "codec", Arc::new(2u32), props(10));
        let (low2, _) = services.insert(PluginId(3), "codec", Arc::new(3u32), props(0));
        services.insert(PluginId(3), "other", Arc::new(4u32), Properties::new());

        let ids: Vec<_> = services.find("codec", None).iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![high.id(), low.id(), low2.id()]);
    }

    #[test]
    fn test_standard_properties_are_set() {
        let services = Services::new(FrameworkId(1));
        let mut user = Properties::new();
        user.insert("service.id".into(), json!(999));
        let (reg, event) = services.insert(PluginId(1), "codec", Arc::new(()), user);

        assert_eq!(event.kind, ServiceEventKind::Registered);
        let found = services.find("codec", None);
        assert_eq!(found[0].properties()["service.id"], json!(reg.id().0));
        assert_eq!(found[0].properties()["objectclass"], json!("codec"));
    }

    #[test]
    fn test_double_remove_is_reported() {
        let services = Services::new(FrameworkId(1));
        let (reg, _) = services.insert(PluginId(1), "codec", Arc::new(()), Properties::new());
        assert!(services.remove(&reg).is_ok());
        assert!(matches!(
            services.remove(&reg),
            Err(FrameworkError::AlreadyUnregistered(id)) if id == reg.id()
        ));
    }

    #[test]
    fn test_remove_owned_by_is_newest_first() {
        let services = Services::new(FrameworkId(1));
        let (a, _) = services.insert(PluginId(7), "x", Arc::new(()), Properties::new());
        services.insert(PluginId(8), "x", Arc::new(()), Properties::new());
        let (b, _) = services.insert(PluginId(7), "y", Arc::new(()), Properties::new());

        let events = services.remove_owned_by(PluginId(7));
        let ids: Vec<_> = events.iter().map(|e| e.service.id).collect();
        assert_eq!(ids, vec![b.id(), a.id()]);
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn test_set_properties_keeps_standard_keys() {
        let services = Services::new(FrameworkId(1));
        let (reg, _) = services.insert(PluginId(1), "codec", Arc::new(()), props(1));
        let event = services.set_properties(&reg, props(5)).unwrap();
        assert_eq!(event.kind, ServiceEventKind::Modified);
        let found = services.find("codec", None);
        assert_eq!(found[0].ranking(), 5);
        assert_eq!(found[0].properties()["objectclass"], json!("codec"));
    }

    #[test]
    fn test_sequence_follows_change_order() {
        let services = Services::new(FrameworkId(1));
        let (a, registered) = services.insert(PluginId(1), "x", Arc::new(()), Properties::new());
        let modified = services.set_properties(&a, props(2)).unwrap();
        services.insert(PluginId(1), "y", Arc::new(()), Properties::new());
        let removed = services.remove_owned_by(PluginId(1));

        let mut seen = vec![registered.sequence, modified.sequence];
        seen.extend(removed.iter().map(|e| e.sequence));
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");
        assert!(services.next_sequence() > seen[3]);
    }

    #[test]
    fn test_typed_lookup() {
        let services = Services::new(FrameworkId(1));
        services.insert(PluginId(1), "greeting", Arc::new(String::from("hi")), Properties::new());
        let found = services.find("greeting", None);
        assert_eq!(found[0].get::<String>().as_deref().map(String::as_str), Some("hi"));
        assert!(found[0].get::<u32>().is_none());
    }

    #[test]
    fn test_filter_applies() {
        let services = Services::new(FrameworkId(1));
        let mut png = Properties::new();
        png.insert("format".into(), json!("png"));
        services.insert(PluginId(1), "codec", Arc::new(()), png);
        services.insert(PluginId(1), "codec", Arc::new(()), Properties::new());

        let filter: ServiceFilter = "(format=png)".parse().unwrap();
        assert_eq!(services.find("codec", Some(&filter)).len(), 1);
    }
}
