//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogLevel, LogOutput, LoggingConfig, PlinthConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &PlinthConfig) -> ConfigResult<()> {
    validate_framework_config(config)?;
    validate_logging_config(&config.logging)?;
    validate_plugin_sections(config)?;
    Ok(())
}

fn validate_framework_config(config: &PlinthConfig) -> ConfigResult<()> {
    if config.framework.storage_dir.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("framework.storage_dir"));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    for (target, level) in &logging.filters {
        if target.trim().is_empty() {
            return Err(ConfigError::validation("Log filter target cannot be empty"));
        }
        if level.parse::<LogLevel>().is_err() {
            return Err(ConfigError::validation(format!(
                "Invalid log level for '{target}': {level}. Valid values are: {:?}",
                LogLevel::ALL.map(LogLevel::as_str)
            )));
        }
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    Ok(())
}

fn validate_plugin_sections(config: &PlinthConfig) -> ConfigResult<()> {
    for name in config.plugins.keys() {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Invalid plugin name in [plugins]: '{name}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&PlinthConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_storage_dir() {
        let mut config = PlinthConfig::default();
        config.framework.storage_dir = PathBuf::new();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_validate_invalid_filter_level() {
        let mut config = PlinthConfig::default();
        config
            .logging
            .filters
            .insert("plinth_framework".into(), "chatty".into());
        assert!(validate_config(&config).is_err());

        config
            .logging
            .filters
            .insert("plinth_framework".into(), "Trace".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = PlinthConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
        config.logging.file_path = Some(PathBuf::from("logs/plinth.log"));
        assert!(validate_config(&config).is_ok());
    }
}
