//! Plinth Runtime - hosting layer for the Plinth plugin framework.
//!
//! This crate provides:
//! - Layered configuration loading with figment (`ConfigLoader`)
//! - Logging setup on top of `tracing-subscriber` (`LoggingBuilder`)
//! - Process orchestration with signal handling (`PlinthRuntime`)
//!
//! ```rust,ignore
//! use plinth_runtime::PlinthRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = PlinthRuntime::new();
//!     runtime.register_activator("greeter", || Greeter::default());
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, LoggingConfig, PlinthConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{PlinthRuntime, RuntimeBuilder};

// Re-export tracing for use by plugin crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for plugin code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
