// Not every helper is used by every test crate that includes this module
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tiercache::{CacheConfig, ModuleLoader, PluginModule};

pub struct TestModule {
    name: String,
}

impl PluginModule for TestModule {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Loader that fabricates a module for any url and counts invocations
pub struct TestLoader {
    pub loads: AtomicUsize,
}

impl TestLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            loads: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ModuleLoader for TestLoader {
    async fn load(&self, url: &str) -> anyhow::Result<Arc<dyn PluginModule>> {
        self.loads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(Arc::new(TestModule {
            name: url.to_string(),
        }))
    }
}

/// Config pointing storage at a temp directory
pub fn config_with_dir(dir: &std::path::Path) -> CacheConfig {
    let mut config = CacheConfig::default();
    config.storage.directory = dir.to_path_buf();
    config
}

/// Config with storage disabled entirely
pub fn memory_only_config() -> CacheConfig {
    let mut config = CacheConfig::default();
    config.storage.enabled = false;
    config
}
