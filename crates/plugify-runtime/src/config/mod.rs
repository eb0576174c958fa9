//! Configuration for the Plugify runtime.
//!
//! Settings are layered with figment: built-in defaults, then configuration
//! files, then `PLUGIFY_*` environment variables, then programmatic merges.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogOutput, LoggingConfig, NativeConfig, PlugifyConfig, ServiceConfig, StoreConfig,
};
pub use validation::validate_config;
