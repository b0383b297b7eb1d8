use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub system: SystemCacheConfig,
    pub plugin: PluginCacheConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemCacheConfig {
    /// Maximum number of in-memory entries before LRU eviction
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginCacheConfig {
    /// Maximum number of loaded modules before insertion-order eviction
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// When false, skip storage resolution entirely (memory-only operation)
    pub enabled: bool,
    /// Directory hosting both backends
    pub directory: PathBuf,
    /// Serialized-size quota for the compact fallback store
    pub fallback_max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            system: SystemCacheConfig { max_entries: 100 },
            plugin: PluginCacheConfig { max_entries: 50 },
            storage: StorageConfig {
                enabled: true,
                directory: PathBuf::from("./data/tiercache"),
                fallback_max_bytes: 5 * 1024 * 1024,
            },
        }
    }
}

impl CacheConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: CacheConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}
