//! Multi-tier client-side cache.
//!
//! Four specialized caches behind one orchestrator:
//! - `SystemCache`: bounded, TTL-aware, persistent (schemas, UI fragments)
//! - `PinnedCache`: durable user-curated aliases, never evicted
//! - `PluginCache`: loaded extension modules with url-collision detection
//! - `SessionCache`: ephemeral per-load scratch data
//!
//! The two persistent caches share a [`storage::StorageAdapter`] resolved
//! asynchronously after construction; if neither backend can be constructed
//! the whole subsystem degrades to memory-only operation.

pub mod config;
pub mod core;
pub mod storage;

// Re-export commonly used types
pub use config::{CacheConfig, PluginCacheConfig, StorageConfig, SystemCacheConfig};
pub use core::{
    CacheEntry, CacheError, CacheKind, CacheOrchestrator, CacheStatsSnapshot, Cached,
    ModuleLoader, PinnedCache, PinnedCacheStats, PinnedEntry, PinnedInfo, PluginCache,
    PluginCacheStats, PluginModule, SessionCache, SessionCacheStats, SetOptions, StorageState,
    SystemCache, SystemCacheStats,
};
pub use storage::{StorageAdapter, StorageBackend, resolve_storage};
