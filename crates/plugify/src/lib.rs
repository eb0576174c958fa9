//! # Plugify
//!
//! Load, upgrade and unload plugins in a running process, and hand them host
//! services through typed dependency injection.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌─────────────────────────────┐
//! │ PluginSource │────▶│ PluginManager │────▶│ Loader "native" | "script"  │
//! │ (bytes+meta) │     │  (per service)│     └─────────────────────────────┘
//! └──────────────┘     │               │────▶ PluginRegistry ──▶ Plugin (load/run/destroy)
//!                      │               │────▶ ComponentInjector ──▶ host components
//!                      └───────────────┘
//! ```
//!
//! - **Core** (`plugify-core`): dynamic values, type descriptors, conversion
//!   and reflective method calls
//! - **Framework** (`plugify-framework`): plugins, loaders, components and
//!   the manager
//! - **Runtime** (`plugify-runtime`): configuration, logging, one manager per
//!   service and optional persistence
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use plugify::prelude::*;
//!
//! #[derive(Reflect, Default)]
//! pub struct Users;
//!
//! #[reflect_methods]
//! impl Users {
//!     pub fn count(&self) -> i64 { 3 }
//! }
//!
//! let manager = PluginManager::builder()
//!     .with_component(Component::new("users", Users))
//!     .build();
//!
//! let meta = Meta::new("count", "script").with_component("", "users");
//! let script = r#"fn Run(ctx) { plugify::Users.invoke("count") }"#;
//! manager.load(meta, &MemorySource::from_bytes(script))?;
//! assert_eq!(manager.run("count", Value::Null)?, Value::Int(3));
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use plugify_core as core;
pub use plugify_framework as framework;
pub use plugify_runtime as runtime;

/// Prelude for hosts and plugin authors.
///
/// ```rust,ignore
/// use plugify::prelude::*;
/// ```
pub mod prelude {
    pub use plugify_core::prelude::*;

    pub use plugify_framework::{
        BoxError, Component, FunctionTable, LogContext, Logger, ManagerError, MemorySource, Meta,
        Plugin, PluginComponents, PluginError, PluginFunc, PluginManager, PluginSource, Util,
    };

    pub use plugify_runtime::{
        PlugifyConfig, PluginManagers, PluginStore, RuntimeError, config::load_config,
        logging::init_from_config,
    };
}
