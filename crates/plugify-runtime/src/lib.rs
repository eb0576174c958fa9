//! Plugify Runtime - hosting layer for the Plugify plugin framework.
//!
//! This crate provides:
//! - Layered configuration ([`config`]) loaded with figment
//! - Logging bootstrap ([`logging`]) over `tracing-subscriber`
//! - Multi-service hosting ([`PluginManagers`]), one plugin manager per
//!   configured service
//! - Optional persistence of installed plugins ([`PluginStore`])
//!
//! ```ignore
//! use std::sync::Arc;
//! use plugify_framework::TracingLogger;
//! use plugify_runtime::{PluginManagers, config, logging};
//!
//! let config = config::load_config()?;
//! logging::init_from_config(&config.logging);
//!
//! let managers = PluginManagers::from_config(&config, &components, Arc::new(TracingLogger));
//! let default = managers.service("")?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod managers;
pub mod store;

pub use config::{ConfigError, ConfigLoader, ConfigResult, PlugifyConfig, ServiceConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use managers::PluginManagers;
pub use store::{
    BlobStore, InstalledPlugin, ListStore, MemoryBlobStore, MemoryListStore, PluginStore,
    StoreError, StoreResult,
};
