//! Process-level orchestration of one framework instance.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use plinth_runtime::PlinthRuntime;
//!
//! // Loads plinth.toml from the current directory, if any.
//! let runtime = PlinthRuntime::new();
//! runtime.register_activator("greeter", || GreeterActivator);
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;

use tokio::signal;
use tracing::info;

use plinth_core::{PluginRef, VersionReq};
use plinth_framework::{FrameworkContext, PluginActivator, PluginDescriptor};

use crate::config::{ConfigLoader, ConfigResult, PlinthConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Owns the configuration and the framework of a host process.
///
/// `run` launches the framework (auto-start plugins included), waits for
/// Ctrl+C or SIGTERM and shuts the framework down again.
pub struct PlinthRuntime {
    config: PlinthConfig,
    framework: FrameworkContext,
}

impl PlinthRuntime {
    /// Loads configuration from the current directory and the environment,
    /// falling back to defaults when it cannot be loaded.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                PlinthConfig::default()
            });
        Self::from_config(&config)
    }

    /// ```rust,ignore
    /// let runtime = PlinthRuntime::builder()
    ///     .config_file("deploy/plinth.toml")
    ///     .profile("production")
    ///     .build()?;
    /// ```
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Initializes logging and builds the framework from `config`.
    pub fn from_config(config: &PlinthConfig) -> Self {
        logging::init_from_config(&config.logging);

        let framework = FrameworkContext::builder()
            .config(config.framework.clone())
            .plugin_configs(config.plugins.clone())
            .build();

        info!(
            framework = %framework.id(),
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            storage_dir = %config.framework.storage_dir.display(),
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            framework,
        }
    }

    pub fn config(&self) -> &PlinthConfig {
        &self.config
    }

    pub fn framework(&self) -> &FrameworkContext {
        &self.framework
    }

    /// See [`FrameworkContext::register_activator`].
    pub fn register_activator<A, F>(&self, name: impl Into<String>, create: F)
    where
        A: PluginActivator,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.framework.register_activator(name, create);
    }

    /// Installs a plugin, initializing the framework first if needed.
    pub fn install(&self, descriptor: PluginDescriptor) -> RuntimeResult<PluginRef> {
        self.framework.init()?;
        Ok(self.framework.install(descriptor)?)
    }

    /// Installs a plugin unless one with the same name and version is
    /// already installed, and starts it.
    pub fn deploy(&self, descriptor: PluginDescriptor) -> RuntimeResult<PluginRef> {
        self.framework.init()?;
        let existing = self
            .framework
            .plugins_by_name(descriptor.name(), &VersionReq::STAR)
            .into_iter()
            .find(|p| &p.version == descriptor.version());
        let plugin = match existing {
            Some(info) => PluginRef::new(self.framework.id(), info.id),
            None => self.framework.install(descriptor)?,
        };
        self.framework.start_plugin(plugin)?;
        Ok(plugin)
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.framework.launch()?;
        info!(framework = %self.framework.id(), "Plinth runtime is now running. Press Ctrl+C to stop.");

        let waited = wait_for_shutdown().await;
        self.framework.shutdown()?;
        waited
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.framework.launch()?;
        shutdown.await;
        self.framework.shutdown()?;
        Ok(())
    }
}

impl Default for PlinthRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`PlinthRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Loads exactly this configuration file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration on top of every other source.
    pub fn merge(mut self, config: PlinthConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn build(self) -> ConfigResult<PlinthRuntime> {
        let config = self.config_loader.load()?;
        Ok(PlinthRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
