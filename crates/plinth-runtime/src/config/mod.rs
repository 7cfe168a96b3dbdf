//! Configuration module for the Plinth runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for the framework instance, logging, and per-plugin sections.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, PlinthConfig, SpanEventConfig,
};
pub use validation::validate_config;
