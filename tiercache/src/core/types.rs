use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in milliseconds.
///
/// All entry timestamps use epoch millis rather than `Instant` because the
/// persistent caches round-trip entries through storage.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Entry stored by [`SystemCache`](crate::core::SystemCache)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cached value
    pub data: Value,
    /// When the entry was written
    pub cached_at: u64,
    /// Last access time (drives LRU ordering)
    pub accessed_at: u64,
    /// Expiration time; `None` means the entry never expires
    pub expires_at: Option<u64>,
    /// Number of reads served from this entry
    pub hits: u64,
    /// Caller-supplied metadata
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl CacheEntry {
    pub fn new(data: Value, ttl_ms: Option<u64>, metadata: HashMap<String, Value>) -> Self {
        let now = now_millis();
        Self {
            data,
            cached_at: now,
            accessed_at: now,
            // A ttl of zero means "no expiration", matching the absent case
            expires_at: ttl_ms.filter(|ttl| *ttl > 0).map(|ttl| now + ttl),
            hits: 0,
            metadata,
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires| now_millis() > expires)
    }
}

/// Entry stored by [`PinnedCache`](crate::core::PinnedCache).
///
/// Deliberately has no expiration field: pinned entries are removed only by
/// explicit user action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinnedEntry {
    pub data: Value,
    pub loaded_at: u64,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Per-alias summary returned by `PinnedCache::list_all`
#[derive(Debug, Clone, Serialize)]
pub struct PinnedInfo {
    pub alias: String,
    pub loaded_at: u64,
    pub age_ms: u64,
    pub metadata: HashMap<String, Value>,
}

/// Entry stored by [`SessionCache`](crate::core::SessionCache)
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub data: Value,
    pub set_at: u64,
}

/// Options for cache writes
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Time-to-live in milliseconds; `None` or `Some(0)` means no expiration
    pub ttl_ms: Option<u64>,
    /// Metadata stored alongside the value
    pub metadata: HashMap<String, Value>,
}

impl SetOptions {
    pub fn with_ttl(ttl_ms: u64) -> Self {
        Self {
            ttl_ms: Some(ttl_ms),
            ..Default::default()
        }
    }
}

/// Logical cache targeted by an orchestrator call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// Semi-stable resources: bounded, TTL-aware, persistent
    #[default]
    System,
    /// User-curated aliases: persistent, never evicted
    Pinned,
    /// Dynamically loaded extension modules: memory-only, insertion-order LRU
    Plugin,
    /// Ephemeral per-load scratch data: memory-only
    Session,
}

/// Statistics for the system cache
#[derive(Debug, Default, Clone, Serialize)]
pub struct SystemCacheStats {
    /// Reads served from memory or storage
    pub hits: u64,
    /// Reads that found nothing usable
    pub misses: u64,
    /// Entries removed by the LRU capacity bound
    pub evictions: u64,
    /// Entries removed by explicit invalidate/clear
    pub invalidations: u64,
    /// Entries removed because their TTL lapsed
    pub expirations: u64,
    /// Current number of in-memory entries
    pub entries: usize,
    /// Configured capacity
    pub capacity: usize,
    /// `100 * hits / (hits + misses)` rounded to one decimal; 0 when there
    /// have been no requests
    pub hit_rate: f64,
}

/// Hit rate as a percentage rounded to one decimal; zero requests yields 0,
/// not NaN
pub(crate) fn hit_rate_percent(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        (hits as f64 * 100.0 / total as f64 * 10.0).round() / 10.0
    }
}

/// Statistics for the pinned cache
#[derive(Debug, Default, Clone, Serialize)]
pub struct PinnedCacheStats {
    pub entries: usize,
    pub aliases: Vec<String>,
}

/// Statistics for the plugin cache
#[derive(Debug, Default, Clone, Serialize)]
pub struct PluginCacheStats {
    pub entries: usize,
    pub capacity: usize,
    /// Successful loader invocations
    pub loads: u64,
    /// Entries removed by the insertion-order bound
    pub evictions: u64,
}

/// Statistics for the session cache
#[derive(Debug, Default, Clone, Serialize)]
pub struct SessionCacheStats {
    pub entries: usize,
    pub keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = CacheEntry::new(json!("v"), None, HashMap::new());
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_zero_ttl_means_no_expiration() {
        let entry = CacheEntry::new(json!("v"), Some(0), HashMap::new());
        assert!(entry.expires_at.is_none());
    }

    #[test]
    fn test_entry_expiry() {
        let mut entry = CacheEntry::new(json!("v"), Some(60_000), HashMap::new());
        assert!(!entry.is_expired());

        entry.expires_at = Some(now_millis() - 1);
        assert!(entry.is_expired());
    }

    #[test]
    fn test_hit_rate_rounding() {
        assert_eq!(hit_rate_percent(1, 2), 33.3);
        assert_eq!(hit_rate_percent(1, 1), 50.0);
        assert_eq!(hit_rate_percent(2, 1), 66.7);
    }

    #[test]
    fn test_hit_rate_zero_requests() {
        assert_eq!(hit_rate_percent(0, 0), 0.0);
    }
}
