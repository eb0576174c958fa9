//! # Plugify Framework
//!
//! Plugin lifecycle runtime: loads, upgrades and unloads plugins at runtime
//! and hands them host services through typed dependency injection.
//!
//! This layer provides:
//! - [`PluginManager`]: load / upgrade / run / unload orchestration
//! - [`Plugin`] and [`PluginRegistry`]: live plugins and their function tables
//! - [`Loader`] with [`NativeLoader`] (`native` feature) and [`ScriptLoader`]
//!   (`script` feature)
//! - [`Component`] / [`ComponentRegistry`]: host services exposed to plugins
//! - [`ComponentInjector`]: symbol environments for interpreted plugins
//! - [`Logger`] and [`Util`]: capabilities every plugin receives
//! - [`PluginSource`]: the transport-agnostic source of plugin bytes

pub mod component;
pub mod error;
pub mod injector;
pub mod loader;
pub mod logger;
pub mod manager;
pub mod meta;
pub mod plugin;
pub mod registry;
pub mod source;
pub mod util;

pub use component::{Component, ComponentDescriptor, ComponentRegistry, PluginComponents, Service};
pub use error::{BoxError, ManagerError, ManagerResult, PluginError, PluginResult, Stage};
pub use injector::{ComponentInjector, Symbol, SymbolEnvironment, TypePlaceholder};
pub use loader::Loader;
pub use logger::{LogContext, LogLevel, Logger, NoopLogger, TracingLogger};
pub use manager::{DEFAULT_SERVICE, PluginManager, PluginManagerBuilder};
pub use meta::{ComponentRequirement, Meta};
pub use plugin::{FunctionTable, MethodFn, Plugin, PluginFunc, PluginStage, PluginSummary, Program};
pub use registry::PluginRegistry;
pub use source::{MemorySource, PluginSource, meta_from_source, read_plugin_content};
pub use util::Util;

#[cfg(feature = "native")]
pub use loader::{NativeLoader, PluginExport};
#[cfg(feature = "script")]
pub use loader::{ScriptLimits, ScriptLoader};

/// Prelude for plugin and host code.
pub mod prelude {
    pub use super::{
        BoxError, Component, FunctionTable, LogContext, Logger, ManagerError, Meta, Plugin,
        PluginComponents, PluginError, PluginFunc, PluginManager, PluginSource, Util,
    };
    pub use plugify_core::prelude::*;
}
