//! Greeter Example
//!
//! Two plugins hosted by one runtime:
//!
//! - `greeter` publishes a `greeting` service built from its `[plugins.greeter]`
//!   configuration section
//! - `welcome` requires `greeter`, looks the service up when it starts and
//!   greets every guest listed in `[plugins.welcome]`
//!
//! Starting `welcome` resolves `greeter` first; stopping `greeter` withdraws
//! its service, which `welcome` observes through a service listener.
//!
//! # Usage
//!
//! ```bash
//! cd demos/greeter && cargo run
//! ```

use plinth::core::{PluginEvent, ServiceEventKind};
use plinth::prelude::*;
use serde::Deserialize;

// ============================================================================
// Greeter plugin
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GreeterConfig {
    greeting: String,
    punctuation: String,
}

impl Default for GreeterConfig {
    fn default() -> Self {
        Self {
            greeting: "Hi".into(),
            punctuation: ".".into(),
        }
    }
}

/// The service `greeter` publishes.
struct Greeting {
    config: GreeterConfig,
}

impl Greeting {
    fn greet(&self, name: &str) -> String {
        format!("{}, {}{}", self.config.greeting, name, self.config.punctuation)
    }
}

struct GreeterActivator;

impl PluginActivator for GreeterActivator {
    fn start(&self, ctx: &PluginContext) -> Result<(), BoxError> {
        let config: GreeterConfig = ctx.get_config()?;
        info!(greeting = %config.greeting, "Greeter starting");

        let mut properties = Properties::new();
        properties.insert("lang".into(), "en".into());
        ctx.register_service("greeting", Arc::new(Greeting { config }), properties)?;
        Ok(())
    }

    fn stop(&self, ctx: &PluginContext) -> Result<(), BoxError> {
        info!(plugin = ctx.name(), "Greeter stopped");
        Ok(())
    }
}

// ============================================================================
// Welcome plugin
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WelcomeConfig {
    guests: Vec<String>,
}

struct WelcomeActivator;

impl PluginActivator for WelcomeActivator {
    fn start(&self, ctx: &PluginContext) -> Result<(), BoxError> {
        let config: WelcomeConfig = ctx.get_config()?;
        let filter: ServiceFilter = "(lang=en)".parse()?;

        let Some(greeting) = ctx
            .find_services("greeting", Some(&filter))
            .into_iter()
            .find_map(|reference| reference.get::<Greeting>())
        else {
            return Err("no english greeting service available".into());
        };

        for guest in &config.guests {
            info!("{}", greeting.greet(guest));
        }

        ctx.subscribe(EventKind::Service, |event| {
            if let Some(service) = event.as_service()
                && service.kind == ServiceEventKind::Unregistered
            {
                warn!(service = %service.service.id, "A service went away");
            }
            Ok(())
        })?;
        Ok(())
    }
}

// ============================================================================
// Main
// ============================================================================

fn log_plugin_event(event: &PluginEvent) {
    info!(
        plugin = %event.name,
        version = %event.version,
        kind = ?event.kind,
        "Plugin event"
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = PlinthRuntime::new();
    let framework = runtime.framework().clone();

    // Plugins reloaded from storage have no factory of their own.
    runtime.register_activator("greeter", || GreeterActivator);
    runtime.register_activator("welcome", || WelcomeActivator);

    framework.subscribe(EventKind::Plugin, |event| {
        if let Some(plugin) = event.as_plugin() {
            log_plugin_event(plugin);
        }
        Ok(())
    });

    runtime.deploy(PluginDescriptor::new("greeter", Version::new(1, 2, 0)))?;
    runtime.deploy(
        PluginDescriptor::new("welcome", Version::new(0, 1, 0))
            .requires(Requirement::new("greeter", VersionReq::parse("^1.0")?)),
    )?;

    runtime.run().await?;
    Ok(())
}
