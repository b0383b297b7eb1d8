//! Fallback storage backend: a single JSON file holding string-serialized
//! values, modelled after small synchronous key/value stores. Capacity is a
//! byte quota; writes that would exceed it are dropped, not fatal.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::{Result, StorageAdapter, StorageBackend, StorageError};

/// Single-file store with values serialized to text. The whole map lives in
/// memory; every mutation rewrites the backing file synchronously.
pub struct CompactStore {
    path: PathBuf,
    max_bytes: usize,
    data: RwLock<HashMap<String, String>>,
}

impl CompactStore {
    /// Create or open the store at `path` with a serialized-size quota
    pub fn open(path: PathBuf, max_bytes: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    // Corruption costs us the old contents, never the session
                    warn!("Compact store at {:?} corrupted ({}), starting empty", path, e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        let store = Self {
            path,
            max_bytes,
            data: RwLock::new(data),
        };
        if !store.path.exists() {
            store.flush()?;
        }
        Ok(store)
    }

    fn flush(&self) -> Result<()> {
        let data = self.data.read();
        let json = serde_json::to_string(&*data).map_err(|e| StorageError::Corrupted {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Serialized size if `key` were set to `text`, discounting any record
    /// the write would replace
    fn projected_len(&self, key: &str, text: &str) -> usize {
        let data = self.data.read();
        let current: usize = data.iter().map(|(k, v)| k.len() + v.len()).sum();
        let replaced = data.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
        current - replaced + key.len() + text.len()
    }
}

#[async_trait]
impl StorageAdapter for CompactStore {
    async fn get(&self, key: &str) -> Option<Value> {
        let text = {
            let data = self.data.read();
            data.get(key).cloned()
        }?;

        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Compact store value corrupted for {}: {}", key, e);
                self.data.write().remove(key);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Value) {
        let text = match serde_json::to_string(&value) {
            Ok(text) => text,
            Err(e) => {
                warn!("Compact store serialize failed for {}: {}", key, e);
                return;
            }
        };

        if self.projected_len(key, &text) > self.max_bytes {
            warn!("Compact store quota exceeded, dropping write for {}", key);
            return;
        }

        self.data.write().insert(key.to_string(), text);
        if let Err(e) = self.flush() {
            warn!("Compact store flush failed after SET {}: {}", key, e);
        } else {
            debug!("Compact store SET {}", key);
        }
    }

    async fn delete(&self, key: &str) {
        let removed = self.data.write().remove(key).is_some();
        if removed {
            if let Err(e) = self.flush() {
                warn!("Compact store flush failed after DELETE {}: {}", key, e);
            } else {
                debug!("Compact store DELETE {}", key);
            }
        }
    }

    async fn get_all_keys(&self, prefix: &str) -> Vec<String> {
        let data = self.data.read();
        data.keys().filter(|k| k.starts_with(prefix)).cloned().collect()
    }

    async fn get_all(&self, prefix: &str) -> Vec<(String, Value)> {
        let texts: Vec<(String, String)> = {
            let data = self.data.read();
            data.iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        texts
            .into_iter()
            .filter_map(|(key, text)| match serde_json::from_str(&text) {
                Ok(value) => Some((key, value)),
                Err(e) => {
                    warn!("Compact store value corrupted for {}: {}", key, e);
                    None
                }
            })
            .collect()
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Compact
    }
}
