pub mod error;
pub mod orchestrator;
pub mod pinned;
pub mod plugin;
pub mod session;
pub mod system;
pub mod types;

pub use error::CacheError;
pub use orchestrator::{CacheOrchestrator, CacheStatsSnapshot, Cached, StorageState};
pub use pinned::PinnedCache;
pub use plugin::{ModuleLoader, PluginCache, PluginModule};
pub use session::SessionCache;
pub use system::SystemCache;
pub use types::{
    CacheEntry, CacheKind, PinnedCacheStats, PinnedEntry, PinnedInfo, PluginCacheStats,
    SessionCacheStats, SetOptions, SystemCacheStats,
};
