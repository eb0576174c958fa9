//! Registry of live plugins.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::plugin::Plugin;

/// Concurrency-safe store of plugins keyed by id.
///
/// Writers (`add`, `remove`) take the exclusive lock, readers (`get`,
/// `list`) the shared one. Critical sections only touch the map.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Arc<Plugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin, returning the one it replaced, if any.
    pub fn add(&self, plugin: Arc<Plugin>) -> Option<Arc<Plugin>> {
        let id = plugin.id().to_string();
        debug!(plugin = %id, "Registered plugin");
        self.plugins.write().insert(id, plugin)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Plugin>> {
        self.plugins.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Plugin>> {
        let removed = self.plugins.write().remove(id);
        if removed.is_some() {
            debug!(plugin = %id, "Removed plugin");
        }
        removed
    }

    /// All registered plugins, in no particular order.
    pub fn list(&self) -> Vec<Arc<Plugin>> {
        self.plugins.read().values().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.plugins.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Meta;
    use crate::plugin::FunctionTable;
    use std::thread;

    fn plugin(id: &str) -> Arc<Plugin> {
        Arc::new(Plugin::new(Meta::new(id, "native"), FunctionTable::new()))
    }

    #[test]
    fn test_add_get_remove() {
        let registry = PluginRegistry::new();
        assert!(registry.add(plugin("a")).is_none());
        assert!(registry.add(plugin("a")).is_some());
        registry.add(plugin("b"));

        assert_eq!(registry.get("a").map(|p| p.id().to_string()), Some("a".into()));
        assert_eq!(registry.len(), 2);

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert!(!registry.contains("a"));
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        let registry = Arc::new(PluginRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    let id = format!("p{i}");
                    registry.add(plugin(&id));
                    assert!(registry.get(&id).is_some());
                    registry.list().len()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap() >= 1);
        }
        assert_eq!(registry.len(), 8);
    }
}
