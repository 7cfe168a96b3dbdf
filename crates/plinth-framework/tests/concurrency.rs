mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use common::{framework, v};
use plinth_core::{OBJECT_CLASS, SERVICE_ID};
use plinth_framework::prelude::*;
use serde_json::json;

#[test]
fn test_concurrently_built_contexts_have_distinct_ids() {
    const THREADS: usize = 16;
    let tmp = tempfile::tempdir().unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|n| {
            let barrier = barrier.clone();
            let dir = tmp.path().join(format!("fw-{n}"));
            thread::spawn(move || {
                barrier.wait();
                // Default builder: ids come from the process-wide counter.
                FrameworkContext::new(FrameworkConfig::with_storage_dir(dir)).id()
            })
        })
        .collect();

    let ids: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids.len(), THREADS);
}

#[test]
fn test_find_during_register_sees_whole_entries() {
    const ROUNDS: usize = 200;
    let tmp = tempfile::tempdir().unwrap();
    let fw = framework(tmp.path());
    fw.init().unwrap();

    for round in 0..ROUNDS {
        let interface = format!("racy-{round}");
        let barrier = Arc::new(Barrier::new(2));

        let writer = {
            let fw = fw.clone();
            let interface = interface.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut props = Properties::new();
                props.insert("payload".into(), json!(round));
                barrier.wait();
                fw.register_service(fw.system_plugin(), &interface, Arc::new(round), props)
                    .unwrap()
            })
        };

        barrier.wait();
        let found = fw.find_services(&interface, None);
        assert!(found.len() <= 1, "round {round}: {} entries", found.len());
        for reference in &found {
            let props = reference.properties();
            assert_eq!(props.get("payload"), Some(&json!(round)));
            assert!(props.contains_key(SERVICE_ID));
            assert_eq!(props.get(OBJECT_CLASS), Some(&json!(interface)));
            assert_eq!(*reference.get::<usize>().unwrap(), round);
        }

        let reg = writer.join().unwrap();
        assert_eq!(fw.find_services(&interface, None).len(), 1);
        fw.unregister_service(&reg).unwrap();
    }
    fw.uninit().unwrap();
}

#[test]
fn test_parallel_installs_get_unique_plugin_ids() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 10;
    let tmp = tempfile::tempdir().unwrap();
    let fw = framework(tmp.path());
    fw.init().unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let fw = fw.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD)
                    .map(|n| {
                        fw.install(PluginDescriptor::new(format!("p{t}-{n}"), v(1, 0, 0)))
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for h in handles {
        for id in h.join().unwrap() {
            assert!(ids.insert(id));
        }
    }
    assert_eq!(ids.len(), THREADS * PER_THREAD);
    // Plus the system plugin.
    assert_eq!(fw.plugins().len(), THREADS * PER_THREAD + 1);
    fw.uninit().unwrap();
}

#[test]
fn test_concurrent_start_and_lookup() {
    struct Slow;
    impl PluginActivator for Slow {
        fn start(&self, ctx: &PluginContext) -> Result<(), BoxError> {
            ctx.register_service("slow", Arc::new(ctx.name().to_string()), Properties::new())?;
            Ok(())
        }
    }

    const THREADS: usize = 6;
    let tmp = tempfile::tempdir().unwrap();
    let fw = framework(tmp.path());
    fw.init().unwrap();
    let plugins: Vec<_> = (0..THREADS)
        .map(|n| {
            fw.install(PluginDescriptor::new(format!("slow-{n}"), v(1, 0, 0)).activator(|| Slow))
                .unwrap()
        })
        .collect();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = plugins
        .into_iter()
        .map(|p| {
            let fw = fw.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                fw.start_plugin(p).unwrap();
                fw.find_services("slow", None).len()
            })
        })
        .collect();

    for h in handles {
        let seen = h.join().unwrap();
        assert!((1..=THREADS).contains(&seen));
    }
    assert_eq!(fw.find_services("slow", None).len(), THREADS);
    fw.uninit().unwrap();
    assert!(fw.find_services("slow", None).is_empty());
}

#[test]
fn test_uninit_during_start_stops_the_started_activator() {
    #[derive(Clone)]
    struct Blocking {
        entered: Arc<Barrier>,
        release: Arc<Barrier>,
        started: Arc<AtomicUsize>,
        stopped: Arc<AtomicUsize>,
    }
    impl PluginActivator for Blocking {
        fn start(&self, _: &PluginContext) -> Result<(), BoxError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.entered.wait();
            self.release.wait();
            Ok(())
        }
        fn stop(&self, _: &PluginContext) -> Result<(), BoxError> {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let tmp = tempfile::tempdir().unwrap();
    let fw = framework(tmp.path());
    fw.init().unwrap();
    let activator = Blocking {
        entered: Arc::new(Barrier::new(2)),
        release: Arc::new(Barrier::new(2)),
        started: Arc::new(AtomicUsize::new(0)),
        stopped: Arc::new(AtomicUsize::new(0)),
    };
    let blocking = activator.clone();
    let p = fw
        .install(PluginDescriptor::new("blocking", v(1, 0, 0)).activator(move || blocking.clone()))
        .unwrap();

    let starter = {
        let fw = fw.clone();
        thread::spawn(move || fw.start_plugin(p))
    };
    activator.entered.wait();
    fw.uninit().unwrap();
    activator.release.wait();

    let result = starter.join().unwrap();
    assert!(
        matches!(result, Err(FrameworkError::NotInitialized(id)) if id == fw.id()),
        "{result:?}"
    );
    assert_eq!(activator.started.load(Ordering::SeqCst), 1);
    assert_eq!(activator.stopped.load(Ordering::SeqCst), 1);
    assert!(!fw.is_initialized());
}

#[test]
fn test_event_sequence_orders_racing_register_and_stop() {
    const ROUNDS: usize = 50;
    let tmp = tempfile::tempdir().unwrap();
    let fw = framework(tmp.path());
    fw.init().unwrap();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        fw.subscribe(EventKind::Service, move |event| {
            if let Some(e) = event.as_service() {
                seen.lock().push((e.service.id, e.kind, e.sequence));
            }
            Ok(())
        });
    }

    for round in 0..ROUNDS {
        let p = fw
            .install(PluginDescriptor::new(format!("racer-{round}"), v(1, 0, 0)))
            .unwrap();
        fw.start_plugin(p).unwrap();
        let barrier = Arc::new(Barrier::new(2));
        let registrar = {
            let fw = fw.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                // Loses the race whenever the stop comes first.
                let _ = fw.register_service(p, "racy", Arc::new(round), Properties::new());
            })
        };
        barrier.wait();
        fw.stop_plugin(p).unwrap();
        registrar.join().unwrap();
    }

    let seen = seen.lock();
    for (id, kind, sequence) in seen.iter() {
        if *kind != plinth_core::ServiceEventKind::Unregistered {
            continue;
        }
        let registered = seen
            .iter()
            .find(|(other, k, _)| other == id && *k == plinth_core::ServiceEventKind::Registered)
            .map(|(_, _, s)| *s);
        assert!(
            registered.is_some_and(|r| r < *sequence),
            "service {id}: registered {registered:?}, unregistered {sequence}"
        );
    }
    fw.uninit().unwrap();
}
