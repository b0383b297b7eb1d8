use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::types::{SessionCacheStats, SessionEntry, now_millis};

/// Ephemeral per-load scratch cache.
///
/// Fully synchronous, no expiration, no persistence. Its contents vanishing
/// with the hosting page is the point: session data may represent a security
/// or freshness boundary that must not outlive the load.
#[derive(Clone, Default)]
pub struct SessionCache {
    data: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, data: Value) {
        debug!("Session cache SET {}", key);
        self.data.write().insert(
            key.to_string(),
            SessionEntry {
                data,
                set_at: now_millis(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).map(|entry| entry.data.clone())
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.data.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut data = self.data.write();
        debug!("Session cache CLEAR ({} entries)", data.len());
        data.clear();
    }

    pub fn stats(&self) -> SessionCacheStats {
        let data = self.data.read();
        SessionCacheStats {
            entries: data.len(),
            keys: data.keys().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_delete() {
        let cache = SessionCache::new();

        cache.set("user_ctx", json!({"id": 7}));
        assert!(cache.has("user_ctx"));
        assert_eq!(cache.get("user_ctx"), Some(json!({"id": 7})));

        assert!(cache.delete("user_ctx"));
        assert!(!cache.delete("user_ctx"));
        assert_eq!(cache.get("user_ctx"), None);
    }

    #[test]
    fn test_clear_and_stats() {
        let cache = SessionCache::new();

        cache.set("a", json!(1));
        cache.set("b", json!(2));

        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert!(stats.keys.contains(&"a".to_string()));

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
