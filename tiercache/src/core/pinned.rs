use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{PinnedCacheStats, PinnedEntry, PinnedInfo, now_millis};
use crate::storage::StorageAdapter;

/// Storage key prefix for pinned entries
pub const PINNED_PREFIX: &str = "pinned:";

/// Durable alias store for user-curated bookmarks.
///
/// Unlike [`SystemCache`](super::SystemCache) there is no capacity bound and
/// no TTL anywhere: entries leave only through explicit `remove`/`clear`.
/// Reads are memory-only; rehydration at startup keeps memory a mirror of
/// storage.
#[derive(Clone)]
pub struct PinnedCache {
    data: Arc<RwLock<HashMap<String, PinnedEntry>>>,
    storage: Arc<RwLock<Option<Arc<dyn StorageAdapter>>>>,
}

impl PinnedCache {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            storage: Arc::new(RwLock::new(None)),
        }
    }

    pub fn attach_storage(&self, storage: Arc<dyn StorageAdapter>) {
        *self.storage.write() = Some(storage);
    }

    fn storage(&self) -> Option<Arc<dyn StorageAdapter>> {
        self.storage.read().clone()
    }

    fn storage_key(alias: &str) -> String {
        format!("{}{}", PINNED_PREFIX, alias)
    }

    /// Unconditionally (re)write an alias in memory and storage; returns the
    /// stored data for chaining.
    pub async fn load(
        &self,
        alias: &str,
        data: Value,
        metadata: HashMap<String, Value>,
    ) -> Value {
        let entry = PinnedEntry {
            data: data.clone(),
            loaded_at: now_millis(),
            metadata,
        };
        let persisted = serde_json::to_value(&entry).ok();

        self.data.write().insert(alias.to_string(), entry);
        debug!("Pinned cache LOAD {}", alias);

        if let Some(storage) = self.storage() {
            match persisted {
                Some(persisted) => storage.set(&Self::storage_key(alias), persisted).await,
                None => warn!("Pinned entry for {} not serializable, memory-only", alias),
            }
        }
        data
    }

    pub fn get(&self, alias: &str) -> Option<Value> {
        self.data.read().get(alias).map(|entry| entry.data.clone())
    }

    pub fn has(&self, alias: &str) -> bool {
        self.data.read().contains_key(alias)
    }

    /// Delete an alias from both tiers
    pub async fn remove(&self, alias: &str) -> bool {
        let removed = self.data.write().remove(alias).is_some();
        if removed {
            debug!("Pinned cache REMOVE {}", alias);
        }
        if let Some(storage) = self.storage() {
            storage.delete(&Self::storage_key(alias)).await;
        }
        removed
    }

    /// Remove all pinned entries from memory and storage
    pub async fn clear(&self) {
        let count = {
            let mut data = self.data.write();
            let count = data.len();
            data.clear();
            count
        };
        debug!("Pinned cache CLEAR ({} entries)", count);

        if let Some(storage) = self.storage() {
            for key in storage.get_all_keys(PINNED_PREFIX).await {
                storage.delete(&key).await;
            }
        }
    }

    /// Every alias with its load time, metadata, and age, for bookmark
    /// management UIs
    pub fn list_all(&self) -> Vec<PinnedInfo> {
        let now = now_millis();
        self.data
            .read()
            .iter()
            .map(|(alias, entry)| PinnedInfo {
                alias: alias.clone(),
                loaded_at: entry.loaded_at,
                age_ms: now.saturating_sub(entry.loaded_at),
                metadata: entry.metadata.clone(),
            })
            .collect()
    }

    /// Load persisted aliases after storage attachment. An alias written in
    /// memory since construction wins unless the persisted record is newer.
    pub async fn rehydrate(&self) {
        let Some(storage) = self.storage() else {
            return;
        };

        let persisted = storage.get_all(PINNED_PREFIX).await;
        let mut loaded = 0usize;

        let mut data = self.data.write();
        for (storage_key, value) in persisted {
            let alias = storage_key[PINNED_PREFIX.len()..].to_string();
            let entry: PinnedEntry = match serde_json::from_value(value) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable pinned entry {}: {}", storage_key, e);
                    continue;
                }
            };
            if let Some(existing) = data.get(&alias) {
                if existing.loaded_at >= entry.loaded_at {
                    continue;
                }
            }
            data.insert(alias, entry);
            loaded += 1;
        }
        drop(data);

        info!("Pinned cache rehydrated: {} aliases loaded", loaded);
    }

    pub fn stats(&self) -> PinnedCacheStats {
        let data = self.data.read();
        PinnedCacheStats {
            entries: data.len(),
            aliases: data.keys().cloned().collect(),
        }
    }
}

impl Default for PinnedCache {
    fn default() -> Self {
        Self::new()
    }
}
