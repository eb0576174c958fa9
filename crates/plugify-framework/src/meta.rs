//! Plugin metadata supplied at load time.

use serde::{Deserialize, Serialize};

use crate::error::{PluginError, PluginResult};

/// A record type a plugin needs visibility into, named by the module path
/// it is defined in and its type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentRequirement {
    #[serde(rename = "pkg_path")]
    pub package: String,
    pub name: String,
}

impl ComponentRequirement {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    pub fn matches(&self, package: &str, name: &str) -> bool {
        self.package == package && self.name == name
    }
}

/// Descriptive metadata of a plugin.
///
/// `id` identifies the plugin across upgrades; `loader` selects the loader
/// kind (`"native"`, `"script"` or any custom loader registered with the
/// manager).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub id: String,
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
    pub loader: String,
    pub components: Vec<ComponentRequirement>,
}

impl Meta {
    /// Creates metadata with the two mandatory fields set.
    pub fn new(id: impl Into<String>, loader: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            loader: loader.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_component(mut self, package: impl Into<String>, name: impl Into<String>) -> Self {
        self.components.push(ComponentRequirement::new(package, name));
        self
    }

    /// Rejects metadata with an empty `id` or `loader`.
    pub fn validate(&self) -> PluginResult<()> {
        if self.id.trim().is_empty() {
            return Err(PluginError::invalid_meta("id must not be empty"));
        }
        if self.loader.trim().is_empty() {
            return Err(PluginError::invalid_meta("loader must not be empty"));
        }
        Ok(())
    }

    /// Returns `true` if the plugin declared the exact `(package, name)` pair.
    pub fn requires(&self, package: &str, name: &str) -> bool {
        self.components.iter().any(|c| c.matches(package, name))
    }

    /// Parses metadata from its JSON form.
    pub fn from_json(text: &str) -> PluginResult<Self> {
        serde_json::from_str(text).map_err(|e| PluginError::invalid_meta(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_missing_fields() {
        assert!(Meta::new("greet", "script").validate().is_ok());
        assert!(matches!(
            Meta::new("", "script").validate(),
            Err(PluginError::InvalidMeta(_))
        ));
        assert!(matches!(
            Meta::new("greet", " ").validate(),
            Err(PluginError::InvalidMeta(_))
        ));
    }

    #[test]
    fn test_requires_exact_pair() {
        let meta = Meta::new("p", "script").with_component("app::models", "User");

        assert!(meta.requires("app::models", "User"));
        assert!(!meta.requires("app::other", "User"));
        assert!(!meta.requires("app::models", "user"));
    }

    #[test]
    fn test_json_field_names() {
        let meta = Meta::from_json(
            r#"{"id": "p", "loader": "native", "components": [{"pkg_path": "a::b", "name": "C"}]}"#,
        )
        .unwrap();

        assert_eq!(meta.components, vec![ComponentRequirement::new("a::b", "C")]);
        assert_eq!(meta.version, "");

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["components"][0]["pkg_path"], "a::b");
    }
}
