//! Storage module for the persistent cache tiers
//!
//! Provides a uniform async key/value contract over two interchangeable
//! backends:
//! - `IndexedStore`: structured, larger-capacity, directory-backed (primary)
//! - `CompactStore`: single-file, text-serialized, small-capacity (fallback)
//!
//! Runtime read/write failures inside a backend are logged and degrade to
//! misses/no-ops; only backend construction is fallible.

pub mod compact;
pub mod indexed;

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub use compact::CompactStore;
pub use indexed::IndexedStore;

use crate::config::StorageConfig;

/// Errors raised while constructing a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupted store at {path:?}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Which concrete backend an adapter wraps, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Indexed,
    Compact,
}

/// Uniform async key/value contract shared by both backends.
///
/// Every operation is async even when the underlying store is synchronous,
/// so callers never branch on backend type. Failures during normal operation
/// surface as `None` / no-op, never as errors.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: Value);

    async fn delete(&self, key: &str);

    /// All stored keys starting with `prefix`
    async fn get_all_keys(&self, prefix: &str) -> Vec<String>;

    /// All stored `(key, value)` pairs whose key starts with `prefix`
    async fn get_all(&self, prefix: &str) -> Vec<(String, Value)>;

    fn backend(&self) -> StorageBackend;
}

/// Resolve a storage adapter per the fallback policy.
///
/// The primary backend is attempted once; on any failure the fallback is
/// attempted; if that fails too the caches run memory-only. Loss of
/// durability is acceptable, loss of the running client is not.
pub async fn resolve_storage(config: &StorageConfig) -> Option<Arc<dyn StorageAdapter>> {
    if !config.enabled {
        info!("Persistent storage disabled by config, caches run memory-only");
        return None;
    }

    match IndexedStore::open(config.directory.join("indexed")).await {
        Ok(store) => {
            info!("Storage resolved: indexed store at {:?}", config.directory);
            return Some(Arc::new(store));
        }
        Err(e) => {
            warn!("Indexed store unavailable ({}), trying compact store", e);
        }
    }

    match CompactStore::open(config.directory.join("compact.json"), config.fallback_max_bytes) {
        Ok(store) => {
            info!("Storage resolved: compact store at {:?}", config.directory);
            Some(Arc::new(store))
        }
        Err(e) => {
            warn!("Compact store unavailable ({}), caches run memory-only", e);
            None
        }
    }
}
