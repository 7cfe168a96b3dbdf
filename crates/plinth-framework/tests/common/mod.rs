#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use plinth_framework::prelude::*;
use plinth_core::PluginEvent;
use plinth_framework::FrameworkIdAllocator;

/// A framework rooted at `<dir>/storage` with its own id counter.
pub fn framework(dir: &Path) -> FrameworkContext {
    framework_with(FrameworkConfig::with_storage_dir(dir.join("storage")))
}

pub fn framework_with(config: FrameworkConfig) -> FrameworkContext {
    FrameworkContext::builder()
        .config(config)
        .id_allocator(FrameworkIdAllocator::new())
        .build()
}

pub fn v(major: u64, minor: u64, patch: u64) -> Version {
    Version::new(major, minor, patch)
}

/// Records every plugin event the framework publishes.
pub fn record_plugin_events(fw: &FrameworkContext) -> Arc<Mutex<Vec<PluginEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    fw.subscribe(EventKind::Plugin, move |event| {
        if let Some(e) = event.as_plugin() {
            sink.lock().push(e.clone());
        }
        Ok(())
    });
    seen
}
