//! Loader for compiled plugins.
//!
//! The payload is a dynamic library exporting a [`PluginExport`] static named
//! `PLUGIFY_PLUGIN_EXPORT`. Plugin crates produce it with [`export_plugin!`]:
//!
//! ```rust,ignore
//! use plugify_framework::prelude::*;
//!
//! fn create() -> FunctionTable {
//!     FunctionTable::new()
//!         .with_load(|_| Ok(()))
//!         .with_run(|input| Ok(input))
//! }
//!
//! plugify_framework::export_plugin!(create);
//! ```
//!
//! Plugin and host must be built with the same compiler and the same
//! `plugify-framework` version; [`PLUGIN_API_VERSION`] guards the latter.

use std::io::Write;
use std::path::{Path, PathBuf};

use libloading::Library;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::Loader;
use crate::error::{PluginError, PluginResult};
use crate::meta::Meta;
use crate::plugin::{FunctionTable, Plugin};
use crate::source::{PluginSource, read_plugin_content};

pub const NATIVE_LOADER: &str = "native";

/// Version of the [`PluginExport`] contract.
pub const PLUGIN_API_VERSION: u32 = 1;

const EXPORT_SYMBOL: &[u8] = b"PLUGIFY_PLUGIN_EXPORT\0";

/// Descriptor exported by a compiled plugin.
#[repr(C)]
pub struct PluginExport {
    pub api_version: u32,
    pub create: fn() -> FunctionTable,
}

/// Exports `$create: fn() -> FunctionTable` as the plugin entry point.
#[macro_export]
macro_rules! export_plugin {
    ($create:expr) => {
        #[unsafe(no_mangle)]
        pub static PLUGIFY_PLUGIN_EXPORT: $crate::loader::PluginExport =
            $crate::loader::PluginExport {
                api_version: $crate::loader::PLUGIN_API_VERSION,
                create: $create,
            };
    };
}

/// Loads compiled plugins through a temporary artifact.
///
/// The artifact is removed as soon as the library is opened, on every path.
/// Opened libraries stay resident for the lifetime of the loader since the
/// function tables they produced point into them.
#[derive(Debug, Default)]
pub struct NativeLoader {
    temp_dir: Option<PathBuf>,
    libraries: Mutex<Vec<Library>>,
}

impl NativeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes artifacts under `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    /// Number of libraries kept resident.
    pub fn resident(&self) -> usize {
        self.libraries.lock().len()
    }

    fn open(&self, content: &[u8]) -> PluginResult<Library> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("plugin_").suffix(std::env::consts::DLL_SUFFIX);
        let mut artifact = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| PluginError::load(format!("failed to create artifact: {e}")))?;

        artifact
            .write_all(content)
            .and_then(|()| artifact.flush())
            .map_err(|e| PluginError::load(format!("failed to write artifact: {e}")))?;

        debug!(path = %artifact.path().display(), size = content.len(), "Opening plugin artifact");
        // SAFETY: initialisers of the library run here; the artifact is
        // trusted to the same degree as the host binary.
        unsafe { Library::new(artifact.path()) }
            .map_err(|e| PluginError::load(format!("failed to open library: {e}")))
    }
}

fn bind(library: &Library) -> PluginResult<FunctionTable> {
    // SAFETY: the symbol is declared by `export_plugin!` as a `PluginExport`
    // static; the api version check below rejects older layouts.
    let export: &PluginExport = unsafe {
        let symbol = library
            .get::<*const PluginExport>(EXPORT_SYMBOL)
            .map_err(|e| PluginError::load(format!("missing plugin export: {e}")))?;
        let ptr: *const PluginExport = *symbol;
        &*ptr
    };

    if export.api_version != PLUGIN_API_VERSION {
        return Err(PluginError::load(format!(
            "plugin api version {} does not match host version {}",
            export.api_version, PLUGIN_API_VERSION
        )));
    }
    Ok((export.create)())
}

impl Loader for NativeLoader {
    fn kind(&self) -> &str {
        NATIVE_LOADER
    }

    fn load(&self, meta: Meta, source: &dyn PluginSource) -> PluginResult<Plugin> {
        let content = read_plugin_content(source)?;
        let library = self.open(&content)?;
        let table = bind(&library)?;
        self.libraries.lock().push(library);

        info!(plugin = %meta.id, loader = NATIVE_LOADER, table = ?table, "Native plugin loaded");
        Ok(Plugin::new(meta, table))
    }
}
