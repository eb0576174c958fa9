//! Pluggable source capability.
//!
//! Loaders do not read plugin bytes from a fixed transport. The host hands
//! them anything implementing [`PluginSource`], typically an adapter over an
//! HTTP request, and [`read_plugin_content`] extracts the payload, either
//! from the raw body or from the `file` part of a multipart form.

use std::collections::HashMap;
use std::io::{self, Read};

use crate::error::{PluginError, PluginResult};
use crate::meta::Meta;

/// Form field carrying the plugin artifact in multipart uploads.
pub const FORM_FILE_FIELD: &str = "file";

/// Form field (or query parameter) carrying the JSON-encoded [`Meta`].
pub const META_FIELD: &str = "meta";

/// Request-like source of plugin content.
pub trait PluginSource {
    /// Header value, if present.
    fn header(&self, key: &str) -> Option<String>;

    /// Reader over the raw body.
    fn body(&self) -> io::Result<Box<dyn Read + '_>>;

    /// Reader over an uploaded form file.
    fn form_file(&self, name: &str) -> io::Result<Box<dyn Read + '_>>;

    fn query(&self, key: &str) -> Option<String>;

    fn post_form(&self, key: &str) -> Option<String>;
}

/// Reads the plugin payload out of `source`.
///
/// Multipart requests yield the [`FORM_FILE_FIELD`] part; anything else yields
/// the body. An unreadable source or an empty payload is rejected.
pub fn read_plugin_content(source: &dyn PluginSource) -> PluginResult<Vec<u8>> {
    let content_type = source.header("Content-Type").unwrap_or_default();

    let mut reader = if content_type.contains("multipart/form-data") {
        source.form_file(FORM_FILE_FIELD).map_err(|e| {
            PluginError::invalid_source(format!(
                "form file '{FORM_FILE_FIELD}' unavailable: {e} (content type: {content_type})"
            ))
        })?
    } else {
        source
            .body()
            .map_err(|e| PluginError::invalid_source(format!("body unavailable: {e}")))?
    };

    let mut content = Vec::new();
    reader
        .read_to_end(&mut content)
        .map_err(|e| PluginError::invalid_source(format!("read error: {e}")))?;

    if content.is_empty() {
        return Err(PluginError::invalid_source("plugin content is empty"));
    }
    Ok(content)
}

/// Parses the [`Meta`] sent alongside the plugin content.
///
/// Looks at the [`META_FIELD`] form field first, then at the query parameter
/// of the same name.
pub fn meta_from_source(source: &dyn PluginSource) -> PluginResult<Meta> {
    let text = source
        .post_form(META_FIELD)
        .or_else(|| source.query(META_FIELD))
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| PluginError::invalid_meta("meta is required"))?;
    Meta::from_json(&text)
}

// ─── MemorySource ─────────────────────────────────────────────────────────────

/// In-memory [`PluginSource`].
///
/// Header lookups are case-insensitive.
///
/// ```rust,ignore
/// let source = MemorySource::new()
///     .with_header("Content-Type", "multipart/form-data; boundary=x")
///     .with_form_file("file", bytes)
///     .with_form_value("meta", r#"{"id": "greet", "loader": "script"}"#);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    headers: HashMap<String, String>,
    body: Vec<u8>,
    files: HashMap<String, Vec<u8>>,
    query: HashMap<String, String>,
    form: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose body is `body`.
    pub fn from_bytes(body: impl Into<Vec<u8>>) -> Self {
        Self::new().with_body(body)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_form_file(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_form_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(key.into(), value.into());
        self
    }
}

impl PluginSource for MemorySource {
    fn header(&self, key: &str) -> Option<String> {
        self.headers.get(&key.to_ascii_lowercase()).cloned()
    }

    fn body(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self.body.as_slice()))
    }

    fn form_file(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        self.files
            .get(name)
            .map(|content| Box::new(content.as_slice()) as Box<dyn Read + '_>)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no form file '{name}'")))
    }

    fn query(&self, key: &str) -> Option<String> {
        self.query.get(key).cloned()
    }

    fn post_form(&self, key: &str) -> Option<String> {
        self.form.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSource;

    impl PluginSource for BrokenSource {
        fn header(&self, _key: &str) -> Option<String> {
            None
        }

        fn body(&self) -> io::Result<Box<dyn Read + '_>> {
            Err(io::Error::other("connection reset"))
        }

        fn form_file(&self, _name: &str) -> io::Result<Box<dyn Read + '_>> {
            Err(io::Error::other("connection reset"))
        }

        fn query(&self, _key: &str) -> Option<String> {
            None
        }

        fn post_form(&self, _key: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_reads_body() {
        let source = MemorySource::from_bytes("fn Run(ctx) { 1 }");
        assert_eq!(read_plugin_content(&source).unwrap(), b"fn Run(ctx) { 1 }");
    }

    #[test]
    fn test_reads_multipart_file() {
        let source = MemorySource::new()
            .with_header("content-type", "multipart/form-data; boundary=x")
            .with_body("ignored")
            .with_form_file("file", "payload");
        assert_eq!(read_plugin_content(&source).unwrap(), b"payload");
    }

    #[test]
    fn test_missing_form_file_is_invalid_source() {
        let source = MemorySource::new()
            .with_header("Content-Type", "multipart/form-data")
            .with_body("ignored");
        assert!(matches!(
            read_plugin_content(&source),
            Err(PluginError::InvalidLoaderSource(_))
        ));
    }

    #[test]
    fn test_empty_or_broken_source_is_invalid() {
        assert!(matches!(
            read_plugin_content(&MemorySource::new()),
            Err(PluginError::InvalidLoaderSource(_))
        ));
        assert!(matches!(
            read_plugin_content(&BrokenSource),
            Err(PluginError::InvalidLoaderSource(_))
        ));
    }

    #[test]
    fn test_meta_from_form_then_query() {
        let form = MemorySource::new().with_form_value("meta", r#"{"id": "a", "loader": "script"}"#);
        assert_eq!(meta_from_source(&form).unwrap().id, "a");

        let query = MemorySource::new().with_query("meta", r#"{"id": "b", "loader": "native"}"#);
        assert_eq!(meta_from_source(&query).unwrap().loader, "native");

        assert!(matches!(
            meta_from_source(&MemorySource::new()),
            Err(PluginError::InvalidMeta(_))
        ));
    }
}
