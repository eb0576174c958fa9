//! Persistence of installed plugins.
//!
//! A [`PluginStore`] keeps the artifact of every installed plugin in a
//! [`BlobStore`] and a membership list of `{meta, storage_key}` records in a
//! [`ListStore`] under `{prefix}:{service}:installed`. On startup,
//! [`PluginStore::restore`] reloads everything the list names.
//!
//! Both stores are opaque pass-through backends; the in-memory
//! implementations here serve single-process hosts and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use plugify_framework::{
    ManagerError, MemorySource, Meta, Plugin, PluginManager, PluginSource, Stage,
    read_plugin_content,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::StoreConfig;
use crate::error::RuntimeResult;

/// Errors raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// The backend rejected or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid record: {0}")]
    Record(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Object storage for plugin artifacts.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `content` and returns the key to download it with.
    async fn upload(&self, name: &str, content: Vec<u8>) -> StoreResult<String>;

    async fn download(&self, key: &str) -> StoreResult<Vec<u8>>;

    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Named lists of strings.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Appends `item` to `list`.
    async fn push(&self, list: &str, item: String) -> StoreResult<()>;

    /// Every item of `list` in push order.
    async fn range(&self, list: &str) -> StoreResult<Vec<String>>;

    /// Removes every occurrence of `item`, returning how many were removed.
    async fn remove(&self, list: &str, item: &str) -> StoreResult<usize>;
}

// =============================================================================
// In-memory backends
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    uploads: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, name: &str, content: Vec<u8>) -> StoreResult<String> {
        let n = self.uploads.fetch_add(1, Ordering::Relaxed) + 1;
        let key = format!("{name}-{n}");
        self.blobs.write().insert(key.clone(), content);
        Ok(key)
    }

    async fn download(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.blobs
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.blobs.write().remove(key);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryListStore {
    lists: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn push(&self, list: &str, item: String) -> StoreResult<()> {
        self.lists.write().entry(list.to_string()).or_default().push(item);
        Ok(())
    }

    async fn range(&self, list: &str) -> StoreResult<Vec<String>> {
        Ok(self.lists.read().get(list).cloned().unwrap_or_default())
    }

    async fn remove(&self, list: &str, item: &str) -> StoreResult<usize> {
        let mut lists = self.lists.write();
        let Some(items) = lists.get_mut(list) else {
            return Ok(0);
        };
        let before = items.len();
        items.retain(|i| i != item);
        Ok(before - items.len())
    }
}

// =============================================================================
// PluginStore
// =============================================================================

/// Membership record of an installed plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    pub meta: Meta,
    pub storage_key: String,
}

/// Installs, restores and uninstalls plugins of one service, keeping the
/// backends in step with its [`PluginManager`].
pub struct PluginStore {
    manager: Arc<PluginManager>,
    blobs: Arc<dyn BlobStore>,
    lists: Arc<dyn ListStore>,
    key_prefix: String,
}

impl PluginStore {
    pub fn new(
        manager: Arc<PluginManager>,
        blobs: Arc<dyn BlobStore>,
        lists: Arc<dyn ListStore>,
    ) -> Self {
        Self {
            manager,
            blobs,
            lists,
            key_prefix: StoreConfig::default().key_prefix,
        }
    }

    pub fn with_config(mut self, config: &StoreConfig) -> Self {
        self.key_prefix.clone_from(&config.key_prefix);
        self
    }

    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    /// List holding the membership records of this service.
    pub fn membership_key(&self) -> String {
        format!("{}:{}:installed", self.key_prefix, self.manager.service_name())
    }

    /// Raw and decoded membership records. Undecodable entries are skipped.
    async fn entries(&self) -> RuntimeResult<Vec<(String, InstalledPlugin)>> {
        let raw = self.lists.range(&self.membership_key()).await?;
        Ok(raw
            .into_iter()
            .filter_map(|item| match serde_json::from_str(&item) {
                Ok(record) => Some((item, record)),
                Err(e) => {
                    warn!(entry = %item, error = %e, "Invalid installed plugin entry");
                    None
                }
            })
            .collect())
    }

    /// Installed plugins in install order.
    pub async fn installed(&self) -> RuntimeResult<Vec<InstalledPlugin>> {
        Ok(self.entries().await?.into_iter().map(|(_, r)| r).collect())
    }

    /// Loads the plugin, then persists its artifact and membership record.
    ///
    /// Records of an earlier install of the same id are replaced once the new
    /// record is stored.
    pub async fn install(
        &self,
        meta: Meta,
        source: &(dyn PluginSource + Sync),
    ) -> RuntimeResult<Arc<Plugin>> {
        let content =
            read_plugin_content(source).map_err(|e| ManagerError::new(Stage::Load, e))?;
        let plugin = self
            .manager
            .load(meta.clone(), &MemorySource::from_bytes(content.clone()))?;

        let previous: Vec<_> = self
            .entries()
            .await?
            .into_iter()
            .filter(|(_, record)| record.meta.id == meta.id)
            .collect();

        let storage_key = self.blobs.upload(&meta.id, content).await?;
        let record = InstalledPlugin { meta, storage_key };
        let encoded = serde_json::to_string(&record).map_err(StoreError::from)?;
        self.lists.push(&self.membership_key(), encoded).await?;

        for (raw, old) in previous {
            self.forget(&raw, &old).await;
        }

        info!(
            service = %self.manager.service_name(),
            plugin = %record.meta.id,
            storage_key = %record.storage_key,
            "Plugin installed"
        );
        Ok(plugin)
    }

    /// Reloads every installed plugin. Entries that fail to download or load
    /// are logged and skipped.
    pub async fn restore(&self) -> RuntimeResult<Vec<Arc<Plugin>>> {
        let records = self.installed().await?;
        let downloads = join_all(
            records
                .iter()
                .map(|record| self.blobs.download(&record.storage_key)),
        )
        .await;

        let mut restored = Vec::new();
        for (record, download) in records.into_iter().zip(downloads) {
            let id = record.meta.id.clone();
            let content = match download {
                Ok(content) => content,
                Err(e) => {
                    warn!(plugin = %id, error = %e, "Failed to download plugin");
                    continue;
                }
            };
            match self
                .manager
                .load(record.meta, &MemorySource::from_bytes(content))
            {
                Ok(plugin) => {
                    debug!(plugin = %id, "Plugin restored");
                    restored.push(plugin);
                }
                Err(e) => warn!(plugin = %id, error = %e, "Failed to restore plugin"),
            }
        }

        info!(
            service = %self.manager.service_name(),
            restored = restored.len(),
            "Installed plugins restored"
        );
        Ok(restored)
    }

    /// Unloads the plugin and drops its records and artifacts.
    ///
    /// A failing `destroy` still uninstalls; its error is returned afterwards.
    pub async fn uninstall(&self, id: &str) -> RuntimeResult<()> {
        let unloaded = match self.manager.unload(id) {
            Err(e) if e.is_not_found() => return Err(e.into()),
            other => other,
        };

        for (raw, record) in self.entries().await? {
            if record.meta.id == id {
                self.forget(&raw, &record).await;
            }
        }
        info!(service = %self.manager.service_name(), plugin = %id, "Plugin uninstalled");

        unloaded.map_err(Into::into)
    }

    async fn forget(&self, raw: &str, record: &InstalledPlugin) {
        if let Err(e) = self.lists.remove(&self.membership_key(), raw).await {
            error!(plugin = %record.meta.id, error = %e, "Failed to remove installed entry");
        }
        if let Err(e) = self.blobs.delete(&record.storage_key).await {
            error!(
                plugin = %record.meta.id,
                storage_key = %record.storage_key,
                error = %e,
                "Failed to delete plugin artifact"
            );
        }
    }
}
