//! Multi-service hosting: one [`PluginManager`] per service name.
//!
//! ```rust,ignore
//! let config = load_config()?;
//! let managers = PluginManagers::from_config(&config, &[users], Arc::new(TracingLogger));
//!
//! let orders = managers.service("orders")?;
//! orders.load(meta, &source)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use plugify_framework::{
    Component, ComponentDescriptor, DEFAULT_SERVICE, Logger, NativeLoader, PluginManager,
    ScriptLoader,
};
use tracing::{info, warn};

use crate::config::{PlugifyConfig, ServiceConfig};
use crate::error::{RuntimeError, RuntimeResult};

/// Plugin managers keyed by service name.
///
/// An empty service name resolves to [`DEFAULT_SERVICE`].
#[derive(Debug, Default)]
pub struct PluginManagers {
    managers: HashMap<String, Arc<PluginManager>>,
}

impl PluginManagers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one manager per configured service, sharing the given
    /// components and logger.
    pub fn from_config(
        config: &PlugifyConfig,
        components: &[Component],
        logger: Arc<dyn Logger>,
    ) -> Self {
        let mut managers = Self::new();
        for service in &config.services {
            let manager = build_manager(config, service, components, logger.clone());
            if let Err(e) = managers.insert(manager) {
                warn!(service = %service.name, error = %e, "Skipping service");
            }
        }
        info!(services = ?managers.services(), "Plugin managers initialised");
        managers
    }

    /// Registers a manager under its service name.
    pub fn insert(&mut self, manager: PluginManager) -> RuntimeResult<Arc<PluginManager>> {
        let name = manager.service_name().to_string();
        if self.managers.contains_key(&name) {
            return Err(RuntimeError::ServiceExists(name));
        }
        let manager = Arc::new(manager);
        self.managers.insert(name, manager.clone());
        Ok(manager)
    }

    pub fn get(&self, service: &str) -> Option<Arc<PluginManager>> {
        self.managers.get(resolve(service)).cloned()
    }

    /// Like [`get`](Self::get), failing with `ServiceNotFound`.
    pub fn service(&self, service: &str) -> RuntimeResult<Arc<PluginManager>> {
        self.get(service)
            .ok_or_else(|| RuntimeError::ServiceNotFound(resolve(service).to_string()))
    }

    /// Service names, sorted.
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.managers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Components a plugin of `service` may request.
    pub fn list_required_components(
        &self,
        service: &str,
    ) -> RuntimeResult<Vec<ComponentDescriptor>> {
        Ok(self.service(service)?.required_components())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<PluginManager>)> {
        self.managers.iter().map(|(name, m)| (name.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

fn resolve(service: &str) -> &str {
    if service.is_empty() {
        DEFAULT_SERVICE
    } else {
        service
    }
}

fn build_manager(
    config: &PlugifyConfig,
    service: &ServiceConfig,
    components: &[Component],
    logger: Arc<dyn Logger>,
) -> PluginManager {
    let mut builder = PluginManager::builder()
        .with_service_name(service.name.as_str())
        .with_shared_logger(logger)
        .without_loaders();

    if service.native {
        let mut loader = NativeLoader::new();
        if let Some(dir) = &config.native.temp_dir {
            loader = loader.with_temp_dir(dir);
        }
        builder = builder.with_loader(loader);
    }
    if service.script {
        builder = builder.with_loader(ScriptLoader::new().with_limits(config.script));
    }

    components
        .iter()
        .cloned()
        .fold(builder, |builder, component| builder.with_component(component))
        .build()
}
