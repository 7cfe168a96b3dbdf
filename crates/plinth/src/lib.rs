//! # Plinth
//!
//! An in-process plugin framework for Rust.
//!
//! ## Overview
//!
//! Plinth hosts named, versioned plugins inside one process.  Plugins
//! declare what they require, move through a fixed lifecycle and publish
//! services that other plugins look up by interface name and filter.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────────────────────┐
//! │   Runtime   │────▶│ FrameworkContext │────▶│ Plugins   (lifecycle, deps)  │
//! │ (config,    │     │  (init/uninit)   │────▶│ Services  (ranked lookup)    │
//! │  logging)   │     └──────────────────┘────▶│ Listeners (event bus)        │
//! └─────────────┘                          ────▶│ Storage   (records, data)    │
//!                                               └──────────────────────────────┘
//! ```
//!
//! - **Runtime**: loads configuration, installs logging, waits for shutdown
//! - **Framework**: one instance with its own storage and id space
//! - **Plugins**: INSTALLED → RESOLVED → STARTING → ACTIVE → STOPPING → UNINSTALLED
//! - **Services**: shared objects registered by active plugins
//! - **Listeners**: synchronous subscribers for plugin, service and framework events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use plinth::prelude::*;
//!
//! struct Greeter;
//!
//! impl PluginActivator for Greeter {
//!     fn start(&self, ctx: &PluginContext) -> Result<(), BoxError> {
//!         ctx.register_service("greeting", Arc::new(String::from("hello")), Properties::new())?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = PlinthRuntime::new();
//!     runtime.deploy(PluginDescriptor::new("greeter", Version::new(1, 0, 0)).activator(|| Greeter))?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: read `plinth.toml` (default)
//! - `yaml-config`: read `plinth.yaml` / `plinth.yml`
//! - `json-log`: JSON log output

pub use plinth_core as core;
pub use plinth_framework as framework;
pub use plinth_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use plinth::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use plinth_runtime::{PlinthConfig, PlinthRuntime, RuntimeError, RuntimeResult};

    // Framework, plugins, services and events
    pub use plinth_framework::prelude::*;

    pub use std::sync::Arc;

    // Logging macros
    pub use plinth_runtime::tracing::{debug, error, info, trace, warn};
}
