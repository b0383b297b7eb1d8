//! Primary storage backend: one JSON document per key in a dedicated
//! directory. Filenames are the hex encoding of the key bytes so arbitrary
//! keys (including namespace prefixes) round-trip through the filesystem.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::{Result, StorageAdapter, StorageBackend};

const PROBE_FILE: &str = ".probe";

/// Directory-backed structured store with materially larger capacity than
/// the compact fallback. Construction performs a write probe and fails
/// rather than partially succeeding.
pub struct IndexedStore {
    directory: PathBuf,
}

impl IndexedStore {
    /// Create or open the store at `directory`
    pub async fn open(directory: PathBuf) -> Result<Self> {
        fs::create_dir_all(&directory).await?;

        // Quota and permission problems must surface at init, not later
        let probe = directory.join(PROBE_FILE);
        fs::write(&probe, b"ok").await?;
        fs::remove_file(&probe).await?;

        Ok(Self { directory })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.json", hex::encode(key)))
    }

    fn key_from_path(path: &Path) -> Option<String> {
        let stem = path.file_stem()?.to_str()?;
        let bytes = hex::decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }
}

#[async_trait]
impl StorageAdapter for IndexedStore {
    async fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Indexed store read failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Indexed store value corrupted for {}: {}", key, e);
                // Drop the unreadable record so it cannot recur
                let _ = fs::remove_file(&path).await;
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Value) {
        let bytes = match serde_json::to_vec(&value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Indexed store serialize failed for {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = fs::write(self.path_for(key), bytes).await {
            warn!("Indexed store write failed for {}: {}", key, e);
        } else {
            debug!("Indexed store SET {}", key);
        }
    }

    async fn delete(&self, key: &str) {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => debug!("Indexed store DELETE {}", key),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Indexed store delete failed for {}: {}", key, e),
        }
    }

    async fn get_all_keys(&self, prefix: &str) -> Vec<String> {
        let mut keys = Vec::new();
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Indexed store scan failed: {}", e);
                return keys;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if let Some(key) = Self::key_from_path(&entry.path()) {
                        if key.starts_with(prefix) {
                            keys.push(key);
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Indexed store scan entry failed: {}", e);
                    break;
                }
            }
        }

        keys
    }

    async fn get_all(&self, prefix: &str) -> Vec<(String, Value)> {
        let mut pairs = Vec::new();
        for key in self.get_all_keys(prefix).await {
            if let Some(value) = self.get(&key).await {
                pairs.push((key, value));
            }
        }
        pairs
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Indexed
    }
}
