//! Plugin lifecycle orchestration.
//!
//! [`PluginManager`] is the component hosts talk to. It:
//!
//! - Owns the [`PluginRegistry`], the host [`ComponentRegistry`] and one
//!   [`Loader`] per loader kind.
//! - Loads plugins: validate meta, pick the loader, build the plugin,
//!   initialise it with the host components and register it. Loading an id
//!   that is already registered **upgrades** the live plugin in place; the new
//!   table is initialised before the swap, so a failed upgrade leaves the
//!   running version untouched.
//! - Runs, lists and unloads plugins. Unloading calls `destroy` and removes
//!   the plugin exactly once.
//!
//! Loads and unloads are serialized with each other. Runs only contend on
//! the per-plugin lock.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = PluginManager::builder()
//!     .with_service_name("orders")
//!     .with_component(Component::new("users", Users::default()))
//!     .build();
//!
//! let meta = Meta::new("greet", "script");
//! manager.load(meta, &MemorySource::from_bytes(r#"fn Run(ctx) { "hi" }"#))?;
//! let output = manager.run("greet", Value::Null)?;
//! manager.unload("greet")?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use plugify_core::Value;
use tracing::{debug, error, info, warn};

use crate::component::{Component, ComponentDescriptor, ComponentRegistry, PluginComponents};
use crate::error::{ManagerResult, PluginError, PluginResult, Stage, StageExt};
use crate::injector::{LOGGER_SYMBOL, UTIL_SYMBOL};
use crate::loader::Loader;
use crate::logger::{LOGGER_PACKAGE, Logger, TracingLogger};
use crate::meta::Meta;
use crate::plugin::{MethodFn, Plugin, PluginSummary};
use crate::registry::PluginRegistry;
use crate::source::PluginSource;
use crate::util::UTIL_PACKAGE;

/// Service name used when none is configured.
pub const DEFAULT_SERVICE: &str = "default";

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`PluginManager`].
///
/// Starts with the built-in loaders of the enabled features and the
/// [`TracingLogger`].
pub struct PluginManagerBuilder {
    service: String,
    logger: Arc<dyn Logger>,
    components: ComponentRegistry,
    loaders: HashMap<String, Arc<dyn Loader>>,
}

impl Default for PluginManagerBuilder {
    fn default() -> Self {
        let mut builder = Self {
            service: DEFAULT_SERVICE.to_string(),
            logger: Arc::new(TracingLogger),
            components: ComponentRegistry::new(),
            loaders: HashMap::new(),
        };
        #[cfg(feature = "native")]
        {
            builder = builder.with_loader(crate::loader::NativeLoader::new());
        }
        #[cfg(feature = "script")]
        {
            builder = builder.with_loader(crate::loader::ScriptLoader::new());
        }
        builder
    }
}

impl PluginManagerBuilder {
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.service = name;
        }
        self
    }

    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    pub fn with_shared_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.components.register(component);
        self
    }

    /// Registers a loader, replacing any loader of the same kind.
    pub fn with_loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loaders.insert(loader.kind().to_string(), Arc::new(loader));
        self
    }

    /// Removes every loader registered so far, built-ins included.
    pub fn without_loaders(mut self) -> Self {
        self.loaders.clear();
        self
    }

    pub fn build(self) -> PluginManager {
        let mut kinds: Vec<&str> = self.loaders.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        info!(
            service = %self.service,
            components = self.components.len(),
            loaders = ?kinds,
            "Plugin manager created"
        );

        PluginManager {
            components: PluginComponents::new(self.logger, Arc::new(self.components)),
            service: self.service,
            loaders: self.loaders,
            registry: PluginRegistry::new(),
            lifecycle: Mutex::new(()),
        }
    }
}

// =============================================================================
// PluginManager
// =============================================================================

/// Orchestrates load, upgrade, run and unload of plugins for one service.
pub struct PluginManager {
    service: String,
    components: PluginComponents,
    loaders: HashMap<String, Arc<dyn Loader>>,
    registry: PluginRegistry,
    lifecycle: Mutex<()>,
}

impl PluginManager {
    pub fn builder() -> PluginManagerBuilder {
        PluginManagerBuilder::default()
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    pub fn components(&self) -> &PluginComponents {
        &self.components
    }

    /// Registered loader kinds, sorted.
    pub fn loader_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.loaders.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    fn loader(&self, kind: &str) -> PluginResult<&Arc<dyn Loader>> {
        self.loaders
            .get(kind)
            .ok_or_else(|| PluginError::LoaderNotFound(kind.to_string()))
    }

    fn registered(&self, id: &str) -> PluginResult<Arc<Plugin>> {
        self.registry
            .get(id)
            .ok_or_else(|| PluginError::PluginNotFound(id.to_string()))
    }

    /// Loads a new plugin or upgrades the registered one with the same id.
    pub fn load(&self, meta: Meta, source: &dyn PluginSource) -> ManagerResult<Arc<Plugin>> {
        let id = meta.id.clone();
        self.try_load(meta, source).inspect_err(|e| {
            error!(service = %self.service, plugin = %id, error = %e, "Plugin load failed");
        })
    }

    fn try_load(&self, meta: Meta, source: &dyn PluginSource) -> ManagerResult<Arc<Plugin>> {
        meta.validate().at(Stage::Load)?;
        let loader = self.loader(&meta.loader).at(Stage::Load)?;

        let _lifecycle = self.lifecycle.lock();
        let candidate = loader.load(meta, source).at(Stage::Load)?;
        candidate.on_init(&self.components).at(Stage::Load)?;

        match self.registry.get(candidate.id()) {
            Some(existing) => {
                warn!(
                    service = %self.service,
                    plugin = %existing.id(),
                    from = %existing.meta().version,
                    to = %candidate.meta().version,
                    "Plugin already loaded, upgrading"
                );
                existing.upgrade(candidate).at(Stage::Load)?;
                Ok(existing)
            }
            None => {
                let plugin = Arc::new(candidate);
                self.registry.add(plugin.clone());
                info!(
                    service = %self.service,
                    plugin = %plugin.id(),
                    loader = %plugin.meta().loader,
                    "Plugin loaded"
                );
                Ok(plugin)
            }
        }
    }

    /// Runs a registered plugin.
    pub fn run(&self, id: &str, input: Value) -> ManagerResult<Value> {
        let plugin = self.registered(id).at(Stage::Run)?;
        debug!(service = %self.service, plugin = %id, "Running plugin");
        plugin.on_run(input).at(Stage::Run).inspect_err(|e| {
            error!(service = %self.service, plugin = %id, error = %e, "Plugin run failed");
        })
    }

    /// Destroys and removes a plugin.
    ///
    /// The plugin is removed even when its `destroy` function fails; that
    /// error is still returned.
    pub fn unload(&self, id: &str) -> ManagerResult<()> {
        let _lifecycle = self.lifecycle.lock();
        let plugin = self.registered(id).at(Stage::Unload)?;

        let destroyed = plugin.on_destroy(Value::Null);
        self.registry.remove(id);
        info!(service = %self.service, plugin = %id, "Plugin unloaded");

        destroyed.at(Stage::Unload).inspect_err(|e| {
            error!(service = %self.service, plugin = %id, error = %e, "Plugin destroy failed");
        })
    }

    pub fn get(&self, id: &str) -> Option<Arc<Plugin>> {
        self.registry.get(id)
    }

    /// Summaries of every registered plugin, ordered by id.
    pub fn list(&self) -> Vec<PluginSummary> {
        let mut summaries: Vec<PluginSummary> =
            self.registry.list().iter().map(|p| p.summary()).collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Looks up an exported method of a registered plugin.
    pub fn method(&self, id: &str, name: &str) -> Option<MethodFn> {
        self.registry.get(id)?.method(name)
    }

    /// Components plugins can request, plus the logger and util handles.
    pub fn required_components(&self) -> Vec<ComponentDescriptor> {
        let mut descriptors: Vec<ComponentDescriptor> = self
            .components
            .components
            .iter()
            .map(Component::descriptor)
            .collect();
        descriptors.push(ComponentDescriptor {
            name: LOGGER_SYMBOL.to_string(),
            package: LOGGER_PACKAGE.to_string(),
        });
        descriptors.push(ComponentDescriptor {
            name: UTIL_SYMBOL.to_string(),
            package: UTIL_PACKAGE.to_string(),
        });
        descriptors
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("service", &self.service)
            .field("loaders", &self.loader_kinds())
            .field("plugins", &self.registry.len())
            .finish_non_exhaustive()
    }
}
