//! Host services exposed to plugins.
//!
//! A [`Component`] is a named host object. Any type that derives `Reflect` and
//! has a reflected method table is a [`Service`]:
//!
//! ```rust,ignore
//! #[derive(Clone, Default, Reflect)]
//! pub struct Users { /* … */ }
//!
//! #[reflect_methods]
//! impl Users {
//!     pub fn find(&self, id: i64) -> Option<User> { /* … */ }
//! }
//!
//! let registry = ComponentRegistry::new().with(Component::new("users", Users::default()));
//! let users: Arc<Users> = registry.get("users").unwrap();
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use plugify_core::{InvokeResult, MethodInfo, Methods, Reflect, TypeInfo, Typed, Value};
use serde::Serialize;
use tracing::warn;

use crate::logger::Logger;
use crate::util::Util;

// ─── Service ──────────────────────────────────────────────────────────────────

/// Object-safe view of a reflected host object.
pub trait Service: Any + Send + Sync {
    /// Shape of the service type.
    fn type_info(&self) -> TypeInfo;

    /// Reflected methods callable on the service.
    fn methods(&self) -> Vec<MethodInfo>;

    /// Calls a reflected method by name.
    fn call(&self, method: &str, args: Vec<Value>) -> InvokeResult<Vec<Value>>;

    /// Current state of the service as a value.
    fn snapshot(&self) -> Value;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T> Service for T
where
    T: Typed + Reflect + Methods + Send + Sync + 'static,
{
    fn type_info(&self) -> TypeInfo {
        <T as Typed>::type_info()
    }

    fn methods(&self) -> Vec<MethodInfo> {
        plugify_core::method_infos::<T>()
    }

    fn call(&self, method: &str, args: Vec<Value>) -> InvokeResult<Vec<Value>> {
        plugify_core::call_method(self, method, args)
    }

    fn snapshot(&self) -> Value {
        self.to_value()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// ─── Component ────────────────────────────────────────────────────────────────

/// A named host service.
#[derive(Clone)]
pub struct Component {
    name: String,
    service: Arc<dyn Service>,
}

impl Component {
    pub fn new<S: Service>(name: impl Into<String>, service: S) -> Self {
        Self::from_arc(name, Arc::new(service))
    }

    /// Wraps an already shared service; the host keeps its own handle.
    pub fn from_arc<S: Service>(name: impl Into<String>, service: Arc<S>) -> Self {
        Self {
            name: name.into(),
            service,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> &Arc<dyn Service> {
        &self.service
    }

    /// Typed handle to the service, if it is a `T`.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.service).into_any().downcast::<T>().ok()
    }

    pub fn call(&self, method: &str, args: Vec<Value>) -> InvokeResult<Vec<Value>> {
        self.service.call(method, args)
    }

    /// Name and originating package of the service type.
    pub fn descriptor(&self) -> ComponentDescriptor {
        let info = self.service.type_info();
        let package = info
            .as_record()
            .map(|record| record.package().to_string())
            .unwrap_or_default();
        ComponentDescriptor {
            name: self.name.clone(),
            package,
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("type", &self.service.type_info().display_name())
            .finish()
    }
}

/// Introspection entry describing a component available to plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentDescriptor {
    pub name: String,
    #[serde(rename = "pkg_path")]
    pub package: String,
}

// ─── ComponentRegistry ────────────────────────────────────────────────────────

/// Named catalogue of components, fixed once the manager is built.
///
/// Iteration is ordered by component name.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: BTreeMap<String, Component>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component, replacing any component of the same name.
    pub fn register(&mut self, component: Component) {
        if let Some(previous) = self.components.insert(component.name.clone(), component) {
            warn!(component = %previous.name, "Component registered twice, replacing previous");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, component: Component) -> Self {
        self.register(component);
        self
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Typed handle to the service registered under `name`.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.component(name)?.downcast()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

// ─── PluginComponents ─────────────────────────────────────────────────────────

/// Host dependencies handed to a plugin when it is initialised.
#[derive(Clone)]
pub struct PluginComponents {
    pub logger: Arc<dyn Logger>,
    pub util: Util,
    pub components: Arc<ComponentRegistry>,
}

impl PluginComponents {
    pub fn new(logger: Arc<dyn Logger>, components: Arc<ComponentRegistry>) -> Self {
        Self {
            logger,
            util: Util,
            components,
        }
    }

    pub fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    /// Typed handle to a component's service.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.components.get(name)
    }
}

impl fmt::Debug for PluginComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginComponents")
            .field("components", &self.components)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use plugify_core::{InvokeError, reflect_methods};

    #[derive(Debug, Default, plugify_core::Reflect)]
    pub struct Counter {
        #[reflect(skip)]
        hits: Mutex<i64>,
    }

    #[reflect_methods]
    impl Counter {
        pub fn hit(&self, by: i64) -> i64 {
            let mut hits = self.hits.lock();
            *hits += by;
            *hits
        }
    }

    #[test]
    fn test_component_call_and_downcast() {
        let registry = ComponentRegistry::new().with(Component::new("counter", Counter::default()));

        let component = registry.component("counter").unwrap();
        assert_eq!(component.call("hit", vec![Value::Int(2)]), Ok(vec![Value::Int(2)]));
        assert!(matches!(
            component.call("miss", vec![]),
            Err(InvokeError::MethodNotFound { .. })
        ));

        let counter: Arc<Counter> = registry.get("counter").unwrap();
        assert_eq!(counter.hit(1), 3);
        assert!(registry.get::<String>("counter").is_none());
    }

    #[test]
    fn test_descriptor_reports_package() {
        let component = Component::new("counter", Counter::default());
        assert_eq!(
            component.descriptor(),
            ComponentDescriptor {
                name: "counter".into(),
                package: module_path!().into(),
            }
        );
    }

    #[test]
    fn test_registry_iterates_by_name() {
        let registry = ComponentRegistry::new()
            .with(Component::new("zeta", Counter::default()))
            .with(Component::new("alpha", Counter::default()));

        let names: Vec<&str> = registry.iter().map(Component::name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
