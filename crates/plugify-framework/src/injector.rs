//! Symbol environment construction for interpreted plugins.
//!
//! A script cannot import host types, so it receives named values instead:
//!
//! | Key | Symbol |
//! |-----|--------|
//! | `Util` | [`Util`] handle |
//! | `Logger` | the manager's [`Logger`] |
//! | `Users` | component `users` (capitalized name) |
//! | `ModelsUser` | placeholder for record `…::models::User` |
//!
//! Placeholder types are only produced for record types that are reachable
//! from a requested component's fields or method parameters, that do not come
//! from `std`/`core`/`alloc`, and that the plugin's [`Meta`] names explicitly.
//! Their keys are the capitalized last package segment followed by the type
//! name; same-named types from different packages get a numeric suffix in
//! package order (`ModelsUser`, `ModelsUser1`, ...).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use plugify_core::{RecordInfo, TypeInfo, Value};
use tracing::{debug, warn};

use crate::component::{Component, PluginComponents};
use crate::logger::Logger;
use crate::meta::{ComponentRequirement, Meta};
use crate::util::Util;

/// Packages whose record types are never injected.
pub const CORE_PACKAGES: &[&str] = &["std", "core", "alloc"];

pub const UTIL_SYMBOL: &str = "Util";
pub const LOGGER_SYMBOL: &str = "Logger";

/// Record type exposed to a script purely for type identity.
#[derive(Debug, Clone)]
pub struct TypePlaceholder {
    info: RecordInfo,
}

impl TypePlaceholder {
    pub fn new(info: RecordInfo) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &RecordInfo {
        &self.info
    }

    pub fn type_info(&self) -> TypeInfo {
        TypeInfo::Record(self.info.clone())
    }

    /// A zero-valued instance of the type.
    pub fn zero_value(&self) -> Value {
        Value::Record(self.info.zero_record())
    }
}

/// A named value in a [`SymbolEnvironment`].
#[derive(Clone)]
pub enum Symbol {
    Util(Util),
    Logger(Arc<dyn Logger>),
    Component(Component),
    Type(TypePlaceholder),
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Util(_) => f.write_str("Util"),
            Self::Logger(_) => f.write_str("Logger"),
            Self::Component(component) => write!(f, "Component({})", component.name()),
            Self::Type(placeholder) => write!(f, "Type({})", placeholder.info.qualified_name()),
        }
    }
}

/// Named values injected into a script, ordered by key.
#[derive(Debug, Clone, Default)]
pub struct SymbolEnvironment {
    symbols: BTreeMap<String, Symbol>,
}

impl SymbolEnvironment {
    pub fn get(&self, key: &str) -> Option<&Symbol> {
        self.symbols.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.symbols.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.symbols.iter().map(|(key, symbol)| (key.as_str(), symbol))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    /// Placeholder types only.
    pub fn types(&self) -> impl Iterator<Item = (&str, &TypePlaceholder)> {
        self.iter().filter_map(|(key, symbol)| match symbol {
            Symbol::Type(placeholder) => Some((key, placeholder)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Builds [`SymbolEnvironment`]s from the host's components.
///
/// The construction is pure: the same components and requirement list always
/// produce the same environment.
pub struct ComponentInjector<'a> {
    components: &'a PluginComponents,
}

impl<'a> ComponentInjector<'a> {
    pub fn new(components: &'a PluginComponents) -> Self {
        Self { components }
    }

    pub fn inject(&self, meta: &Meta) -> SymbolEnvironment {
        let mut symbols = BTreeMap::new();
        symbols.insert(UTIL_SYMBOL.to_string(), Symbol::Util(self.components.util));
        symbols.insert(
            LOGGER_SYMBOL.to_string(),
            Symbol::Logger(self.components.logger.clone()),
        );
        for component in self.components.components.iter() {
            symbols.insert(capitalize(component.name()), Symbol::Component(component.clone()));
        }

        let mut origins: HashMap<String, Vec<&'static str>> = HashMap::new();
        for info in self.requested_types(&meta.components) {
            let key = symbol_key(&info, &mut origins);
            if symbols.contains_key(&key) {
                warn!(
                    plugin = %meta.id,
                    symbol = %key,
                    type_name = %info.qualified_name(),
                    "Type symbol shadows an existing symbol, skipping"
                );
                continue;
            }
            debug!(plugin = %meta.id, symbol = %key, type_name = %info.qualified_name(), "Injected type");
            symbols.insert(key, Symbol::Type(TypePlaceholder::new(info)));
        }

        SymbolEnvironment { symbols }
    }

    /// Record types reachable from requested components that survive the
    /// core-package and requirement filters, ordered by `(package, name)`.
    fn requested_types(&self, requirements: &[ComponentRequirement]) -> Vec<RecordInfo> {
        let mut found = BTreeMap::new();
        for component in self.components.components.iter() {
            if !is_requested(component, requirements) {
                continue;
            }
            let service = component.service();
            let mut visited = HashSet::new();
            if let Some(record) = service.type_info().as_record() {
                for field in record.fields() {
                    collect(&field.ty(), &mut found, &mut visited);
                }
            }
            for method in service.methods() {
                for param in &method.params {
                    collect(param, &mut found, &mut visited);
                }
            }
        }

        found
            .into_values()
            .filter(|info: &RecordInfo| !is_core_package(info.package()))
            .filter(|info| {
                requirements
                    .iter()
                    .any(|req| req.matches(info.package(), info.name()))
            })
            .collect()
    }
}

fn is_requested(component: &Component, requirements: &[ComponentRequirement]) -> bool {
    let info = component.service().type_info();
    let record = info.as_record();
    requirements.iter().any(|req| {
        req.name == component.name()
            || record.is_some_and(|record| req.matches(record.package(), record.name()))
    })
}

fn collect(
    ty: &TypeInfo,
    found: &mut BTreeMap<(&'static str, &'static str), RecordInfo>,
    visited: &mut HashSet<(&'static str, &'static str)>,
) {
    let Some(record) = ty.innermost().as_record() else {
        return;
    };
    let id = (record.package(), record.name());
    if !visited.insert(id) {
        return;
    }
    found.entry(id).or_insert_with(|| record.clone());
    for field in record.fields() {
        collect(&field.ty(), found, visited);
    }
}

fn is_core_package(package: &str) -> bool {
    let root = package.split("::").next().unwrap_or(package);
    CORE_PACKAGES.contains(&root)
}

fn symbol_key(info: &RecordInfo, origins: &mut HashMap<String, Vec<&'static str>>) -> String {
    let base = format!("{}{}", capitalize(info.package_base()), info.name());
    let seen = origins.entry(base.clone()).or_default();
    let index = match seen.iter().position(|package| *package == info.package()) {
        Some(index) => index,
        None => {
            seen.push(info.package());
            seen.len() - 1
        }
    };
    if index == 0 { base } else { format!("{base}{index}") }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentRegistry;
    use crate::logger::NoopLogger;
    use plugify_core::{Reflect, reflect_methods};
    use std::time::Duration;

    pub mod a {
        pub mod models {
            use plugify_core::Reflect;

            #[derive(Debug, Clone, Default, Reflect)]
            pub struct Address {
                pub city: String,
            }

            #[derive(Debug, Clone, Default, Reflect)]
            pub struct User {
                pub name: String,
                pub address: Address,
            }

            #[derive(Debug, Clone, Default, Reflect)]
            pub struct Tag {
                pub label: String,
            }
        }
    }

    pub mod b {
        pub mod models {
            use plugify_core::Reflect;

            #[derive(Debug, Clone, Default, Reflect)]
            pub struct User {
                pub email: String,
            }
        }
    }

    #[derive(Debug, Default, Reflect)]
    pub struct Directory {
        pub owner: a::models::User,
        pub tags: Vec<a::models::Tag>,
        pub timeout: Duration,
    }

    #[reflect_methods]
    impl Directory {
        pub fn register(&self, user: b::models::User) -> bool {
            !user.email.is_empty()
        }
    }

    #[derive(Debug, Default, Reflect)]
    pub struct Clock {
        pub zone: a::models::Tag,
    }

    #[reflect_methods]
    impl Clock {}

    fn components() -> PluginComponents {
        let registry = ComponentRegistry::new()
            .with(Component::new("directory", Directory::default()))
            .with(Component::new("clock", Clock::default()));
        PluginComponents::new(Arc::new(NoopLogger), Arc::new(registry))
    }

    fn package(module: &str) -> String {
        format!("{}::{module}", module_path!())
    }

    fn meta() -> Meta {
        Meta::new("p", "script")
            .with_component("", "directory")
            .with_component(package("a::models"), "User")
            .with_component(package("a::models"), "Address")
            .with_component(package("b::models"), "User")
            .with_component("core::time", "Duration")
    }

    #[test]
    fn test_seeds_handles_and_components() {
        let components = components();
        let env = ComponentInjector::new(&components).inject(&Meta::new("p", "script"));

        let keys: Vec<&str> = env.keys().collect();
        assert_eq!(keys, vec!["Clock", "Directory", "Logger", "Util"]);
        assert!(matches!(env.get("Directory"), Some(Symbol::Component(_))));
        assert_eq!(env.types().count(), 0);
    }

    #[test]
    fn test_collision_suffix_by_package_order() {
        let components = components();
        let env = ComponentInjector::new(&components).inject(&meta());

        let types: Vec<(&str, String)> = env
            .types()
            .map(|(key, placeholder)| (key, placeholder.info().qualified_name()))
            .collect();
        assert_eq!(
            types,
            vec![
                ("ModelsAddress", format!("{}::Address", package("a::models"))),
                ("ModelsUser", format!("{}::User", package("a::models"))),
                ("ModelsUser1", format!("{}::User", package("b::models"))),
            ]
        );
    }

    #[test]
    fn test_unrequired_and_core_types_are_excluded() {
        let components = components();
        let meta = Meta::new("p", "script")
            .with_component("", "directory")
            .with_component(package("a::models"), "Tag")
            .with_component("core::time", "Duration");
        let env = ComponentInjector::new(&components).inject(&meta);

        let keys: Vec<&str> = env.types().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["ModelsTag"]);
    }

    #[test]
    fn test_component_must_be_requested() {
        let components = components();
        let meta = Meta::new("p", "script").with_component(package("b::models"), "User");
        let env = ComponentInjector::new(&components).inject(&meta);
        assert_eq!(env.types().count(), 0);

        // Naming the service record also selects the component.
        let meta = meta.with_component(module_path!(), "Directory");
        let env = ComponentInjector::new(&components).inject(&meta);
        let keys: Vec<&str> = env.types().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["ModelsUser"]);
    }

    #[test]
    fn test_environment_is_deterministic() {
        let first = components();
        let reordered = PluginComponents::new(
            Arc::new(NoopLogger),
            Arc::new(
                ComponentRegistry::new()
                    .with(Component::new("clock", Clock::default()))
                    .with(Component::new("directory", Directory::default())),
            ),
        );

        let a: Vec<String> = ComponentInjector::new(&first)
            .inject(&meta())
            .keys()
            .map(String::from)
            .collect();
        let b: Vec<String> = ComponentInjector::new(&reordered)
            .inject(&meta())
            .keys()
            .map(String::from)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_placeholder_zero_value() {
        let components = components();
        let env = ComponentInjector::new(&components).inject(&meta());
        let Some(Symbol::Type(placeholder)) = env.get("ModelsUser") else {
            panic!("ModelsUser not injected");
        };

        let zero = placeholder.zero_value();
        let record = zero.as_record().unwrap();
        assert_eq!(record.type_name(), "User");
        assert_eq!(record.field("name"), Some(&Value::from("")));
        assert!(matches!(record.field("address"), Some(Value::Record(_))));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("users"), "Users");
        assert_eq!(capitalize(""), "");
        assert!(is_core_package("std::collections"));
        assert!(!is_core_package("standard::x"));
    }
}
