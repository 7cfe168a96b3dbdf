//! Synchronous listener bus.
//!
//! Subscribers register per [`EventKind`].  [`Listeners::publish`] takes a
//! snapshot of the subscriber list before dispatching, so callbacks are free
//! to subscribe, unsubscribe or call back into the framework; such changes
//! apply from the next event on.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{error, trace};

use plinth_core::{BoxError, Event, EventKind, FrameworkEvent, FrameworkId};

/// Callback invoked for each matching event.
pub type ListenerFn = dyn Fn(&Event) -> Result<(), BoxError> + Send + Sync;

/// Handle returned by [`Listeners::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerToken(u64);

struct Subscription {
    token: ListenerToken,
    kind: EventKind,
    callback: Arc<ListenerFn>,
}

/// The event bus of one framework instance.
pub struct Listeners {
    framework: FrameworkId,
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
    next_token: AtomicU64,
}

impl Listeners {
    pub fn new(framework: FrameworkId) -> Self {
        Self {
            framework,
            subscriptions: RwLock::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Registers `callback` for every later event of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> ListenerToken
    where
        F: Fn(&Event) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let token = ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Arc::new(Subscription {
            token,
            kind,
            callback: Arc::new(callback),
        }));
        trace!(framework = %self.framework, ?kind, token = token.0, "Listener subscribed");
        token
    }

    /// Removes a subscription. Returns `false` if the token is unknown.
    pub fn unsubscribe(&self, token: ListenerToken) -> bool {
        let mut subs = self.subscriptions.write();
        let before = subs.len();
        subs.retain(|s| s.token != token);
        before != subs.len()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every subscription.
    pub fn clear(&self) {
        self.subscriptions.write().clear();
    }

    /// Delivers `event` to every current subscriber of its kind, in
    /// subscription order.
    ///
    /// A subscriber that returns an error or panics is logged and reported
    /// as a [`FrameworkEvent::Error`]; the remaining subscribers still get
    /// the event.
    pub fn publish(&self, event: &Event) {
        let failures = self.dispatch(event);
        if failures.is_empty() || event.kind() == EventKind::Framework {
            return;
        }
        for message in failures {
            let report = Event::Framework(FrameworkEvent::Error {
                framework: self.framework,
                plugin: None,
                message,
            });
            // Failures while reporting are only logged.
            self.dispatch(&report);
        }
    }

    /// Publishes a batch in order.
    pub fn publish_all(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.publish(&event);
        }
    }

    fn dispatch(&self, event: &Event) -> Vec<String> {
        let kind = event.kind();
        let snapshot: Vec<Arc<Subscription>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.kind == kind)
            .cloned()
            .collect();

        let mut failures = Vec::new();
        for sub in snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (sub.callback)(event)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            error!(
                framework = %self.framework,
                token = sub.token.0,
                ?kind,
                error = %message,
                "Listener failed"
            );
            failures.push(format!("listener {} failed: {message}", sub.token.0));
        }
        failures
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("framework", &self.framework)
            .field("subscriptions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn started() -> Event {
        Event::Framework(FrameworkEvent::Started {
            framework: FrameworkId(1),
        })
    }

    fn service_event() -> Event {
        use plinth_core::{PluginId, Properties, ServiceEvent, ServiceEventKind, ServiceId, ServiceInfo};
        Event::Service(ServiceEvent {
            sequence: 1,
            kind: ServiceEventKind::Registered,
            framework: FrameworkId(1),
            service: ServiceInfo {
                id: ServiceId(1),
                owner: PluginId(0),
                interface: "x".into(),
                properties: Properties::new(),
            },
        })
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = Listeners::new(FrameworkId(1));
        let seen = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let seen = seen.clone();
            bus.subscribe(EventKind::Framework, move |_| {
                seen.lock().push(n);
                Ok(())
            });
        }
        bus.publish(&started());
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_only_matching_kind_is_delivered() {
        let bus = Listeners::new(FrameworkId(1));
        let hits = Arc::new(AtomicU64::new(0));
        let h = hits.clone();
        bus.subscribe(EventKind::Plugin, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        bus.publish(&started());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failing_listener_is_isolated_and_reported() {
        let bus = Listeners::new(FrameworkId(1));
        let delivered = Arc::new(AtomicU64::new(0));
        let errors = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(EventKind::Service, |_| Err("boom".into()));
        bus.subscribe(EventKind::Service, |_| panic!("kaboom"));
        let d = delivered.clone();
        bus.subscribe(EventKind::Service, move |_| {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let e = errors.clone();
        bus.subscribe(EventKind::Framework, move |event| {
            if let Some(FrameworkEvent::Error { message, .. }) = event.as_framework() {
                e.lock().push(message.clone());
            }
            Ok(())
        });

        bus.publish(&service_event());

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        let errors = errors.lock();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("boom"));
        assert!(errors[1].contains("kaboom"));
    }

    #[test]
    fn test_subscribe_during_dispatch_applies_to_next_event() {
        let bus = Arc::new(Listeners::new(FrameworkId(1)));
        let late_hits = Arc::new(AtomicU64::new(0));

        let bus2 = bus.clone();
        let hits = late_hits.clone();
        bus.subscribe(EventKind::Framework, move |_| {
            let hits = hits.clone();
            bus2.subscribe(EventKind::Framework, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });

        bus.publish(&started());
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);
        bus.publish(&started());
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_keeps_current_event() {
        let bus = Arc::new(Listeners::new(FrameworkId(1)));
        let second_hits = Arc::new(AtomicU64::new(0));
        let second_token = Arc::new(Mutex::new(None));

        let bus2 = bus.clone();
        let token_slot = second_token.clone();
        bus.subscribe(EventKind::Framework, move |_| {
            if let Some(token) = *token_slot.lock() {
                bus2.unsubscribe(token);
            }
            Ok(())
        });
        let hits = second_hits.clone();
        let token = bus.subscribe(EventKind::Framework, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        *second_token.lock() = Some(token);

        bus.publish(&started());
        bus.publish(&started());
        assert_eq!(second_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_token() {
        let bus = Listeners::new(FrameworkId(1));
        let token = bus.subscribe(EventKind::Plugin, |_| Ok(()));
        assert!(bus.unsubscribe(token));
        assert!(!bus.unsubscribe(token));
        assert!(bus.is_empty());
    }
}
