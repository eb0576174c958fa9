//! Error types for the plugin lifecycle.

use std::fmt;

use thiserror::Error;

/// Boxed error returned by plugin-authored functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by loaders and plugin lifecycle operations.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The source could not supply plugin content.
    #[error("invalid loader source: {0}")]
    InvalidLoaderSource(String),

    /// The plugin artifact could not be materialised, opened or bound.
    #[error("load error: {0}")]
    Load(String),

    #[error("plugin has no load method")]
    NoLoadMethod,

    #[error("plugin has no run method")]
    NoRunMethod,

    #[error("plugin '{0}' not found")]
    PluginNotFound(String),

    #[error("loader '{0}' not found")]
    LoaderNotFound(String),

    #[error("invalid meta: {0}")]
    InvalidMeta(String),

    /// The plugin was destroyed and can no longer run or be upgraded.
    #[error("plugin '{0}' has been destroyed")]
    Destroyed(String),

    /// Script compilation or evaluation failed.
    #[error("script error: {0}")]
    Script(String),

    /// A plugin function returned an error.
    #[error("plugin error: {0}")]
    Plugin(#[source] BoxError),
}

impl PluginError {
    pub fn invalid_source(msg: impl Into<String>) -> Self {
        Self::InvalidLoaderSource(msg.into())
    }

    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn invalid_meta(msg: impl Into<String>) -> Self {
        Self::InvalidMeta(msg.into())
    }

    pub fn script(msg: impl fmt::Display) -> Self {
        Self::Script(msg.to_string())
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Manager operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Run,
    Unload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Run => "run",
            Self::Unload => "unload",
        })
    }
}

/// A [`PluginError`] annotated with the manager stage it surfaced in.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct ManagerError {
    pub stage: Stage,
    #[source]
    pub source: PluginError,
}

impl ManagerError {
    pub fn new(stage: Stage, source: PluginError) -> Self {
        Self { stage, source }
    }

    /// Returns `true` if the underlying error is [`PluginError::PluginNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self.source, PluginError::PluginNotFound(_))
    }
}

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Attaches a [`Stage`] to plugin results.
pub(crate) trait StageExt<T> {
    fn at(self, stage: Stage) -> ManagerResult<T>;
}

impl<T> StageExt<T> for PluginResult<T> {
    fn at(self, stage: Stage) -> ManagerResult<T> {
        self.map_err(|source| ManagerError::new(stage, source))
    }
}
