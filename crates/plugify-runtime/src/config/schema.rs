//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use plugify_framework::{DEFAULT_SERVICE, ScriptLimits};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlugifyConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// One plugin manager is built per service.
    #[serde(default = "default_services")]
    pub services: Vec<ServiceConfig>,

    /// Native loader settings.
    #[serde(default)]
    pub native: NativeConfig,

    /// Sandbox limits for script plugins.
    #[serde(default)]
    pub script: ScriptLimits,

    /// Persistence of installed plugins.
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for PlugifyConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            services: default_services(),
            native: NativeConfig::default(),
            script: ScriptLimits::default(),
            store: StoreConfig::default(),
        }
    }
}

impl PlugifyConfig {
    /// Looks up a service by name.
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
}

fn default_services() -> Vec<ServiceConfig> {
    vec![ServiceConfig::default()]
}

// =============================================================================
// Logging
// =============================================================================

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` otherwise.
    Json,
}

/// Destination of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Include thread IDs in log lines.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line in log lines.
    #[serde(default)]
    pub file_location: bool,

    /// Per-module level overrides, e.g. `plugify_framework = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            thread_ids: false,
            file_location: false,
            filters: BTreeMap::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

// =============================================================================
// Services and loaders
// =============================================================================

/// A named plugin manager and the loaders it accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,

    /// Accept `native` plugins.
    #[serde(default = "default_true")]
    pub native: bool,

    /// Accept `script` plugins.
    #[serde(default = "default_true")]
    pub script: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::named(DEFAULT_SERVICE)
    }
}

impl ServiceConfig {
    /// A service with every built-in loader enabled.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native: true,
            script: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Native loader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NativeConfig {
    /// Directory for temporary library artifacts. Defaults to the system
    /// temp dir.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

// =============================================================================
// Store
// =============================================================================

/// Persistence of installed plugins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// First segment of every store key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_key_prefix() -> String {
    "plugin".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlugifyConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0].name, DEFAULT_SERVICE);
        assert!(config.service(DEFAULT_SERVICE).is_some_and(|s| s.native && s.script));
        assert_eq!(config.store.key_prefix, "plugin");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PlugifyConfig = serde_json::from_str(
            r#"{
                "logging": { "format": "pretty" },
                "services": [{ "name": "orders", "native": false }],
                "script": { "max_operations": 500 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        let orders = config.service("orders").unwrap();
        assert!(!orders.native);
        assert!(orders.script);
        assert_eq!(config.script.max_operations, 500);
        assert_eq!(config.script.max_call_levels, ScriptLimits::default().max_call_levels);
    }
}
