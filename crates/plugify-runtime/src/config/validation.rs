//! Configuration validation utilities.

use std::collections::HashSet;

use plugify_framework::ScriptLimits;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, PlugifyConfig, ServiceConfig, StoreConfig};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration.
pub fn validate_config(config: &PlugifyConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_services_config(&config.services)?;
    validate_script_limits(&config.script)?;
    validate_store_config(&config.store)?;
    Ok(())
}

fn validate_log_level(level: &str) -> ConfigResult<()> {
    if !VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Err(ConfigError::validation(format!(
            "Invalid log level: {level}. Valid values are: {VALID_LOG_LEVELS:?}"
        )));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    validate_log_level(&logging.level)?;

    for (module, level) in &logging.filters {
        if module.is_empty() {
            return Err(ConfigError::validation("Log filter module cannot be empty"));
        }
        validate_log_level(level)?;
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    Ok(())
}

fn validate_services_config(services: &[ServiceConfig]) -> ConfigResult<()> {
    if services.is_empty() {
        return Err(ConfigError::validation("At least one service is required"));
    }

    let mut seen = HashSet::new();
    for service in services {
        if service.name.trim().is_empty() {
            return Err(ConfigError::missing_field("services.name"));
        }
        if service.name.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Service name cannot contain whitespace: {:?}",
                service.name
            )));
        }
        if !seen.insert(service.name.as_str()) {
            return Err(ConfigError::DuplicateService(service.name.clone()));
        }
    }

    Ok(())
}

fn validate_script_limits(limits: &ScriptLimits) -> ConfigResult<()> {
    let checks = [
        ("script.max_operations", limits.max_operations == 0),
        ("script.max_call_levels", limits.max_call_levels == 0),
        ("script.max_string_size", limits.max_string_size == 0),
        ("script.max_array_size", limits.max_array_size == 0),
        ("script.max_map_size", limits.max_map_size == 0),
    ];
    for (field, is_zero) in checks {
        if is_zero {
            return Err(ConfigError::validation(format!(
                "{field} must be greater than 0"
            )));
        }
    }
    Ok(())
}

fn validate_store_config(store: &StoreConfig) -> ConfigResult<()> {
    if store.key_prefix.is_empty() {
        return Err(ConfigError::missing_field("store.key_prefix"));
    }
    if store.key_prefix.contains(':') {
        return Err(ConfigError::validation("store.key_prefix cannot contain ':'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&PlugifyConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = PlugifyConfig::default();
        config.logging.level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = PlugifyConfig::default();
        config
            .logging
            .filters
            .insert("plugify_framework".into(), "chatty".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_level_is_case_insensitive() {
        let mut config = PlugifyConfig::default();
        config.logging.level = "DEBUG".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_file_output_requires_path() {
        let mut config = PlugifyConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.logging.file_path = Some("plugify.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_duplicate_service() {
        let config = PlugifyConfig {
            services: vec![ServiceConfig::named("orders"), ServiceConfig::named("orders")],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateService(name)) if name == "orders"
        ));
    }

    #[test]
    fn test_validate_service_names() {
        for name in ["", "  ", "order service"] {
            let config = PlugifyConfig {
                services: vec![ServiceConfig::named(name)],
                ..Default::default()
            };
            assert!(validate_config(&config).is_err(), "{name:?} accepted");
        }

        let config = PlugifyConfig {
            services: Vec::new(),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_script_limit() {
        let mut config = PlugifyConfig::default();
        config.script.max_call_levels = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("script.max_call_levels"));
    }

    #[test]
    fn test_validate_store_prefix() {
        let mut config = PlugifyConfig::default();
        config.store.key_prefix = "a:b".to_string();
        assert!(validate_config(&config).is_err());
    }
}
