use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, info};

use super::error::{CacheError, Result};
use super::pinned::PinnedCache;
use super::plugin::{ModuleLoader, PluginCache, PluginModule};
use super::session::SessionCache;
use super::system::SystemCache;
use super::types::{
    CacheKind, PinnedCacheStats, PluginCacheStats, SessionCacheStats, SetOptions,
    SystemCacheStats,
};
use crate::config::CacheConfig;
use crate::storage::{StorageBackend, resolve_storage};

/// Value returned by orchestrator dispatch. Plugin entries are live code
/// handles, everything else is data.
#[derive(Clone)]
pub enum Cached {
    Data(Value),
    Module(Arc<dyn PluginModule>),
}

impl Cached {
    pub fn into_data(self) -> Option<Value> {
        match self {
            Cached::Data(value) => Some(value),
            Cached::Module(_) => None,
        }
    }

    pub fn into_module(self) -> Option<Arc<dyn PluginModule>> {
        match self {
            Cached::Module(module) => Some(module),
            Cached::Data(_) => None,
        }
    }
}

impl std::fmt::Debug for Cached {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cached::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Cached::Module(module) => f.debug_tuple("Module").field(&module.name()).finish(),
        }
    }
}

/// Lifecycle of the deferred storage attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "backend")]
pub enum StorageState {
    /// Storage resolution has not completed; persistent caches run memory-only
    Pending,
    /// An adapter is attached and rehydration has run
    Attached(StorageBackend),
    /// Both backends failed; the session continues without durability
    Unavailable,
}

/// Composite statistics from all four caches
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStatsSnapshot {
    pub storage: StorageState,
    pub system: SystemCacheStats,
    pub pinned: PinnedCacheStats,
    pub plugin: PluginCacheStats,
    pub session: SessionCacheStats,
}

/// Single entry point over the four caches.
///
/// Construction is synchronous and the caches are immediately usable;
/// [`init_storage`](CacheOrchestrator::init_storage) later resolves the
/// storage adapter, attaches it to the two persistent caches, and runs their
/// rehydration pass. Operations issued before that completes simply run
/// memory-only.
#[derive(Clone)]
pub struct CacheOrchestrator {
    system: SystemCache,
    pinned: PinnedCache,
    plugin: PluginCache,
    session: SessionCache,
    config: CacheConfig,
    state_tx: Arc<watch::Sender<StorageState>>,
    state_rx: watch::Receiver<StorageState>,
    init_started: Arc<AtomicBool>,
}

impl CacheOrchestrator {
    pub fn new(config: CacheConfig, loader: Arc<dyn ModuleLoader>) -> Self {
        info!(
            "Initializing cache orchestrator: system capacity {}, plugin capacity {}",
            config.system.max_entries, config.plugin.max_entries
        );

        let (state_tx, state_rx) = watch::channel(StorageState::Pending);
        Self {
            system: SystemCache::new(config.system.max_entries),
            pinned: PinnedCache::new(),
            plugin: PluginCache::new(loader, config.plugin.max_entries),
            session: SessionCache::new(),
            config,
            state_tx: Arc::new(state_tx),
            state_rx,
            init_started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Resolve the storage adapter, attach it to the persistent caches, and
    /// rehydrate them. Idempotent: later calls return immediately, even while
    /// the first is still resolving.
    pub async fn init_storage(&self) {
        // Claim the initialization before the first await so concurrent
        // callers cannot run resolution twice
        if self.init_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let state = match resolve_storage(&self.config.storage).await {
            Some(storage) => {
                let backend = storage.backend();
                self.system.attach_storage(storage.clone());
                self.pinned.attach_storage(storage);
                self.system.rehydrate().await;
                self.pinned.rehydrate().await;
                StorageState::Attached(backend)
            }
            None => StorageState::Unavailable,
        };

        info!("Storage initialization complete: {:?}", state);
        let _ = self.state_tx.send(state);
    }

    pub fn storage_state(&self) -> StorageState {
        *self.state_rx.borrow()
    }

    /// Wait until storage resolution has finished (attached or confirmed
    /// unavailable). Cache operations never need to await this.
    pub async fn ready(&self) {
        let mut rx = self.state_rx.clone();
        let _ = rx.wait_for(|state| *state != StorageState::Pending).await;
    }

    pub async fn get(&self, key: &str, kind: CacheKind) -> Option<Cached> {
        match kind {
            CacheKind::System => self.system.get(key).await.map(Cached::Data),
            CacheKind::Pinned => self.pinned.get(key).map(Cached::Data),
            CacheKind::Plugin => self.plugin.get(key).map(Cached::Module),
            CacheKind::Session => self.session.get(key).map(Cached::Data),
        }
    }

    /// Write a value into the cache selected by `kind`.
    ///
    /// For [`CacheKind::Plugin`] the value must be a JSON string holding the
    /// module url; the write becomes a `load_and_cache` call.
    pub async fn set(
        &self,
        key: &str,
        value: Value,
        kind: CacheKind,
        options: SetOptions,
    ) -> Result<()> {
        match kind {
            CacheKind::System => {
                self.system.set(key, value, options).await;
                Ok(())
            }
            CacheKind::Pinned => {
                self.pinned.load(key, value, options.metadata).await;
                Ok(())
            }
            CacheKind::Plugin => {
                let url = value.as_str().ok_or_else(|| {
                    CacheError::InvalidValue(format!(
                        "plugin value for '{}' must be a url string",
                        key
                    ))
                })?;
                self.plugin.load_and_cache(key, url).await?;
                Ok(())
            }
            CacheKind::Session => {
                self.session.set(key, value);
                Ok(())
            }
        }
    }

    pub async fn has(&self, key: &str, kind: CacheKind) -> bool {
        match kind {
            CacheKind::System => self.system.has(key),
            CacheKind::Pinned => self.pinned.has(key),
            CacheKind::Plugin => self.plugin.has(key),
            CacheKind::Session => self.session.has(key),
        }
    }

    pub async fn delete(&self, key: &str, kind: CacheKind) -> bool {
        match kind {
            CacheKind::System => self.system.invalidate(key).await,
            CacheKind::Pinned => self.pinned.remove(key).await,
            CacheKind::Plugin => self.plugin.remove(key),
            CacheKind::Session => self.session.delete(key),
        }
    }

    /// Clear one cache, or all four when `kind` is `None`
    pub async fn clear(&self, kind: Option<CacheKind>) {
        match kind {
            Some(CacheKind::System) => self.system.clear().await,
            Some(CacheKind::Pinned) => self.pinned.clear().await,
            Some(CacheKind::Plugin) => self.plugin.clear(),
            Some(CacheKind::Session) => self.session.clear(),
            None => self.clear_all().await,
        }
    }

    /// Clear all four caches; each clear is independent of the others
    pub async fn clear_all(&self) {
        debug!("Clearing all caches");
        self.system.clear().await;
        self.pinned.clear().await;
        self.plugin.clear();
        self.session.clear();
    }

    /// Load a plugin directly, without wrapping the url in a JSON value
    pub async fn load_plugin(&self, name: &str, url: &str) -> Result<Arc<dyn PluginModule>> {
        self.plugin.load_and_cache(name, url).await
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            storage: self.storage_state(),
            system: self.system.stats(),
            pinned: self.pinned.stats(),
            plugin: self.plugin.stats(),
            session: self.session.stats(),
        }
    }

    pub fn system(&self) -> &SystemCache {
        &self.system
    }

    pub fn pinned(&self) -> &PinnedCache {
        &self.pinned
    }

    pub fn plugin(&self) -> &PluginCache {
        &self.plugin
    }

    pub fn session(&self) -> &SessionCache {
        &self.session
    }
}
