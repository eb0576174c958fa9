//! Loaders turn plugin bytes plus metadata into [`Plugin`] instances.
//!
//! | Kind | Loader | Feature |
//! |------|--------|---------|
//! | `native` | [`NativeLoader`]: compiled dynamic library | `native` |
//! | `script` | [`ScriptLoader`]: Rhai source evaluated at init | `script` |
//!
//! Hosts may register their own [`Loader`] under any other kind.

use crate::error::PluginResult;
use crate::meta::Meta;
use crate::plugin::Plugin;
use crate::source::PluginSource;

#[cfg(feature = "native")]
pub mod native;
#[cfg(feature = "script")]
pub mod script;

#[cfg(feature = "native")]
pub use native::{NATIVE_LOADER, NativeLoader, PLUGIN_API_VERSION, PluginExport};
#[cfg(feature = "script")]
pub use script::{SCRIPT_LOADER, ScriptLimits, ScriptLoader};

/// Strategy that materialises a plugin.
pub trait Loader: Send + Sync {
    /// Loader kind matched against [`Meta::loader`].
    fn kind(&self) -> &str;

    /// Reads the payload from `source` and builds an uninitialised plugin.
    fn load(&self, meta: Meta, source: &dyn PluginSource) -> PluginResult<Plugin>;
}
