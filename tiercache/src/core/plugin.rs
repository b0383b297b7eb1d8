use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::{CacheError, Result};
use super::types::{PluginCacheStats, now_millis};

/// Handle to a dynamically loaded extension module. Modules are live code,
/// never serialized, so the plugin cache is memory-only.
pub trait PluginModule: Send + Sync {
    fn name(&self) -> &str;
}

/// Strategy for turning a source url into a loaded module.
///
/// Injected so alternate loading strategies (bundled resolution, filesystem,
/// registry) can be substituted without touching collision or eviction logic.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, url: &str) -> anyhow::Result<Arc<dyn PluginModule>>;
}

struct PluginEntry {
    module: Arc<dyn PluginModule>,
    url: String,
    #[allow(dead_code)]
    loaded_at: u64,
}

struct PluginInner {
    data: HashMap<String, PluginEntry>,
    /// Insertion order (front = oldest). Plugins are rarely re-queried after
    /// first load, so insertion order stands in for access order.
    insert_order: VecDeque<String>,
    max_size: usize,
}

/// Cache of dynamically loaded extension modules keyed by logical name.
///
/// A logical name maps to at most one source url, ever: re-registering a
/// name under a different url is a collision error, because silently
/// swapping code behind a name already in use would change the behavior of
/// initialized call sites without their knowledge.
#[derive(Clone)]
pub struct PluginCache {
    loader: Arc<dyn ModuleLoader>,
    inner: Arc<RwLock<PluginInner>>,
    stats: Arc<RwLock<PluginStatsInner>>,
}

#[derive(Default)]
struct PluginStatsInner {
    loads: u64,
    evictions: u64,
}

impl PluginCache {
    pub fn new(loader: Arc<dyn ModuleLoader>, max_size: usize) -> Self {
        Self {
            loader,
            inner: Arc::new(RwLock::new(PluginInner {
                data: HashMap::new(),
                insert_order: VecDeque::new(),
                max_size,
            })),
            stats: Arc::new(RwLock::new(PluginStatsInner::default())),
        }
    }

    /// Load a module by logical name, or return the cached one.
    ///
    /// Identical `(name, url)` is idempotent and performs no second load.
    /// Same name with a different url raises a collision error and leaves
    /// the original entry intact. Nothing is cached on load failure.
    pub async fn load_and_cache(&self, name: &str, url: &str) -> Result<Arc<dyn PluginModule>> {
        if let Some(module) = self.check_cached(name, url)? {
            debug!("Plugin cache HIT for {}", name);
            return Ok(module);
        }

        let module = self.loader.load(url).await.map_err(|source| {
            warn!("Plugin load failed for {} from {}: {}", name, url, source);
            CacheError::PluginLoadFailed {
                name: name.to_string(),
                url: url.to_string(),
                source,
            }
        })?;

        // The load was a suspension point; another call may have cached the
        // name in the meantime, so re-check before inserting.
        if let Some(existing) = self.check_cached(name, url)? {
            return Ok(existing);
        }

        let mut inner = self.inner.write();
        inner.data.insert(
            name.to_string(),
            PluginEntry {
                module: module.clone(),
                url: url.to_string(),
                loaded_at: now_millis(),
            },
        );
        inner.insert_order.push_back(name.to_string());
        debug!("Plugin cache LOAD {} from {}", name, url);

        let mut evictions = 0u64;
        while inner.data.len() > inner.max_size {
            if let Some(oldest) = inner.insert_order.pop_front() {
                inner.data.remove(&oldest);
                evictions += 1;
                debug!("Plugin cache EVICT {}", oldest);
            } else {
                break;
            }
        }
        drop(inner);

        let mut stats = self.stats.write();
        stats.loads += 1;
        stats.evictions += evictions;

        Ok(module)
    }

    fn check_cached(&self, name: &str, url: &str) -> Result<Option<Arc<dyn PluginModule>>> {
        let inner = self.inner.read();
        match inner.data.get(name) {
            Some(entry) if entry.url == url => Ok(Some(entry.module.clone())),
            Some(entry) => Err(CacheError::PluginCollision {
                name: name.to_string(),
                cached_url: entry.url.clone(),
                requested_url: url.to_string(),
            }),
            None => Ok(None),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PluginModule>> {
        self.inner.read().data.get(name).map(|e| e.module.clone())
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.read().data.contains_key(name)
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut inner = self.inner.write();
        let removed = inner.data.remove(name).is_some();
        if removed {
            inner.insert_order.retain(|n| n != name);
            debug!("Plugin cache REMOVE {}", name);
        }
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        debug!("Plugin cache CLEAR ({} entries)", inner.data.len());
        inner.data.clear();
        inner.insert_order.clear();
    }

    pub fn stats(&self) -> PluginCacheStats {
        let inner = self.inner.read();
        let stats = self.stats.read();
        PluginCacheStats {
            entries: inner.data.len(),
            capacity: inner.max_size,
            loads: stats.loads,
            evictions: stats.evictions,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct FakeModule {
        name: String,
    }

    impl PluginModule for FakeModule {
        fn name(&self) -> &str {
            &self.name
        }
    }

    /// Loader that fabricates a module per url and counts invocations
    pub(crate) struct CountingLoader {
        pub loads: AtomicUsize,
        pub fail_urls: Vec<String>,
    }

    impl CountingLoader {
        pub fn new() -> Self {
            Self {
                loads: AtomicUsize::new(0),
                fail_urls: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl ModuleLoader for CountingLoader {
        async fn load(&self, url: &str) -> anyhow::Result<Arc<dyn PluginModule>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_urls.iter().any(|u| u == url) {
                anyhow::bail!("module not reachable at {}", url);
            }
            Ok(Arc::new(FakeModule {
                name: url.to_string(),
            }))
        }
    }

    #[tokio::test]
    async fn test_load_and_get() {
        let loader = Arc::new(CountingLoader::new());
        let cache = PluginCache::new(loader.clone(), 10);

        let module = cache.load_and_cache("charts", "https://ext/charts.js").await.unwrap();
        assert_eq!(module.name(), "https://ext/charts.js");
        assert!(cache.has("charts"));
        assert_eq!(cache.stats().loads, 1);
    }

    #[tokio::test]
    async fn test_idempotent_reload() {
        let loader = Arc::new(CountingLoader::new());
        let cache = PluginCache::new(loader.clone(), 10);

        let first = cache.load_and_cache("x", "https://ext/x.js").await.unwrap();
        let second = cache.load_and_cache("x", "https://ext/x.js").await.unwrap();

        // Same module reference, exactly one underlying load
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_collision_preserves_original() {
        let loader = Arc::new(CountingLoader::new());
        let cache = PluginCache::new(loader.clone(), 10);

        let original = cache.load_and_cache("x", "https://a/x.js").await.unwrap();
        let err = match cache.load_and_cache("x", "https://b/x.js").await {
            Ok(_) => panic!("collision must not succeed"),
            Err(err) => err,
        };

        match err {
            CacheError::PluginCollision {
                name,
                cached_url,
                requested_url,
            } => {
                assert_eq!(name, "x");
                assert_eq!(cached_url, "https://a/x.js");
                assert_eq!(requested_url, "https://b/x.js");
            }
            other => panic!("expected collision, got {:?}", other),
        }

        // Original entry intact, no extra load attempted
        let still = cache.load_and_cache("x", "https://a/x.js").await.unwrap();
        assert!(Arc::ptr_eq(&original, &still));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_failure_caches_nothing() {
        let mut loader = CountingLoader::new();
        loader.fail_urls.push("https://down/x.js".to_string());
        let cache = PluginCache::new(Arc::new(loader), 10);

        let err = match cache.load_and_cache("x", "https://down/x.js").await {
            Ok(_) => panic!("load must fail for unreachable url"),
            Err(err) => err,
        };
        match err {
            CacheError::PluginLoadFailed { name, url, .. } => {
                assert_eq!(name, "x");
                assert_eq!(url, "https://down/x.js");
            }
            other => panic!("expected load failure, got {:?}", other),
        }
        assert!(!cache.has("x"));
        assert_eq!(cache.stats().loads, 0);
    }

    #[tokio::test]
    async fn test_insertion_order_eviction() {
        let loader = Arc::new(CountingLoader::new());
        let cache = PluginCache::new(loader, 2);

        cache.load_and_cache("a", "https://ext/a.js").await.unwrap();
        cache.load_and_cache("b", "https://ext/b.js").await.unwrap();
        cache.load_and_cache("c", "https://ext/c.js").await.unwrap();

        assert!(!cache.has("a"), "oldest insertion should be evicted");
        assert!(cache.has("b"));
        assert!(cache.has("c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let loader = Arc::new(CountingLoader::new());
        let cache = PluginCache::new(loader, 10);

        cache.load_and_cache("a", "https://ext/a.js").await.unwrap();
        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));

        cache.load_and_cache("b", "https://ext/b.js").await.unwrap();
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
