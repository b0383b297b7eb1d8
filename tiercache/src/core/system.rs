use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{CacheEntry, SetOptions, SystemCacheStats, hit_rate_percent, now_millis};
use crate::storage::StorageAdapter;

/// Storage key prefix for system cache entries
pub const SYSTEM_PREFIX: &str = "system:";

struct SystemInner {
    data: HashMap<String, CacheEntry>,
    /// Recency order (front = least recently used). Every read and write of
    /// a live key moves it to the back; this is the LRU contract, not an
    /// incidental property of the container.
    lru_order: VecDeque<String>,
    max_size: usize,
}

impl SystemInner {
    fn touch(&mut self, key: &str) {
        self.lru_order.retain(|k| k != key);
        self.lru_order.push_back(key.to_string());
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.lru_order.retain(|k| k != key);
        }
        removed
    }

    /// Evict from the LRU end until within capacity; returns evicted keys
    fn enforce_capacity(&mut self) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.data.len() > self.max_size {
            match self.lru_order.pop_front() {
                Some(oldest) => {
                    self.data.remove(&oldest);
                    debug!("System cache EVICT {}", oldest);
                    evicted.push(oldest);
                }
                None => break,
            }
        }
        evicted
    }
}

#[derive(Default)]
struct SystemStatsInner {
    hits: u64,
    misses: u64,
    evictions: u64,
    invalidations: u64,
    expirations: u64,
}

/// Capacity-bounded, TTL-aware cache for semi-stable resources (schemas,
/// rendered fragments, configuration blobs).
///
/// Backed by a [`StorageAdapter`] for cross-session durability when one is
/// attached; until then (or if none resolves) it operates memory-only. The
/// adapter is injected after construction by the orchestrator, and the lock
/// is never held across storage awaits.
#[derive(Clone)]
pub struct SystemCache {
    inner: Arc<RwLock<SystemInner>>,
    stats: Arc<RwLock<SystemStatsInner>>,
    storage: Arc<RwLock<Option<Arc<dyn StorageAdapter>>>>,
}

impl SystemCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SystemInner {
                data: HashMap::new(),
                lru_order: VecDeque::new(),
                max_size,
            })),
            stats: Arc::new(RwLock::new(SystemStatsInner::default())),
            storage: Arc::new(RwLock::new(None)),
        }
    }

    /// Attach the resolved storage adapter. Until this is called every
    /// storage interaction is a no-op.
    pub fn attach_storage(&self, storage: Arc<dyn StorageAdapter>) {
        *self.storage.write() = Some(storage);
    }

    fn storage(&self) -> Option<Arc<dyn StorageAdapter>> {
        self.storage.read().clone()
    }

    fn storage_key(key: &str) -> String {
        format!("{}{}", SYSTEM_PREFIX, key)
    }

    /// Get a value, consulting memory first and then storage.
    ///
    /// An expired in-memory entry is removed from both tiers and counted as
    /// one expiration; later reads of the same key are plain misses. A live
    /// storage hit is promoted into memory.
    pub async fn get(&self, key: &str) -> Option<Value> {
        enum MemOutcome {
            Hit(Option<Value>),
            Expired,
            Absent,
        }

        let outcome = {
            let mut inner = self.inner.write();
            let mut stats = self.stats.write();

            match inner.data.get(key).map(CacheEntry::is_expired) {
                Some(true) => {
                    inner.remove(key);
                    stats.expirations += 1;
                    debug!("System cache EXPIRE {}", key);
                    MemOutcome::Expired
                }
                Some(false) => {
                    let value = inner.data.get_mut(key).map(|entry| {
                        entry.hits += 1;
                        entry.accessed_at = now_millis();
                        entry.data.clone()
                    });
                    inner.touch(key);
                    stats.hits += 1;
                    debug!("System cache HIT {}", key);
                    MemOutcome::Hit(value)
                }
                None => MemOutcome::Absent,
            }
        };

        match outcome {
            MemOutcome::Hit(value) => value,
            MemOutcome::Expired => {
                // Best-effort removal of the expired record from storage
                if let Some(storage) = self.storage() {
                    storage.delete(&Self::storage_key(key)).await;
                }
                None
            }
            MemOutcome::Absent => self.get_from_storage(key).await,
        }
    }

    async fn get_from_storage(&self, key: &str) -> Option<Value> {
        let Some(storage) = self.storage() else {
            self.stats.write().misses += 1;
            debug!("System cache MISS {}", key);
            return None;
        };

        let storage_key = Self::storage_key(key);
        let persisted = storage.get(&storage_key).await;

        let entry: CacheEntry = match persisted.and_then(|v| serde_json::from_value(v).ok()) {
            Some(entry) => entry,
            None => {
                self.stats.write().misses += 1;
                debug!("System cache MISS {}", key);
                return None;
            }
        };

        if entry.is_expired() {
            storage.delete(&storage_key).await;
            self.stats.write().misses += 1;
            debug!("System cache MISS {} (expired in storage)", key);
            return None;
        }

        // Promote into memory at the MRU position. A set for this key may
        // have landed while the storage read was in flight; the newer write
        // wins and the stale record is not promoted.
        let (value, evicted) = {
            let mut inner = self.inner.write();
            let newer_in_memory = inner.data.get(key).and_then(|existing| {
                if existing.cached_at >= entry.cached_at {
                    Some(existing.data.clone())
                } else {
                    None
                }
            });
            match newer_in_memory {
                Some(value) => (value, Vec::new()),
                None => {
                    let value = entry.data.clone();
                    inner.data.insert(key.to_string(), entry);
                    inner.touch(key);
                    (value, inner.enforce_capacity())
                }
            }
        };
        self.record_evictions(&evicted).await;

        self.stats.write().hits += 1;
        debug!("System cache HIT {} (promoted from storage)", key);
        Some(value)
    }

    /// Write a value, persist it, and enforce the capacity bound
    pub async fn set(&self, key: &str, value: Value, options: SetOptions) {
        let entry = CacheEntry::new(value, options.ttl_ms, options.metadata);
        let persisted = serde_json::to_value(&entry).ok();

        let evicted = {
            let mut inner = self.inner.write();
            inner.data.insert(key.to_string(), entry);
            inner.touch(key);
            inner.enforce_capacity()
        };
        debug!("System cache SET {}", key);

        if let Some(storage) = self.storage() {
            match persisted {
                Some(persisted) => storage.set(&Self::storage_key(key), persisted).await,
                None => warn!("System cache entry for {} not serializable, memory-only", key),
            }
        }
        self.record_evictions(&evicted).await;
    }

    async fn record_evictions(&self, evicted: &[String]) {
        if evicted.is_empty() {
            return;
        }
        self.stats.write().evictions += evicted.len() as u64;
        if let Some(storage) = self.storage() {
            for key in evicted {
                storage.delete(&Self::storage_key(key)).await;
            }
        }
    }

    /// Memory-only presence check; does not mutate recency or counters
    pub fn has(&self, key: &str) -> bool {
        self.inner
            .read()
            .data
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Explicit removal from both tiers, counted as an invalidation
    pub async fn invalidate(&self, key: &str) -> bool {
        let removed = self.inner.write().remove(key).is_some();
        if removed {
            self.stats.write().invalidations += 1;
            debug!("System cache INVALIDATE {}", key);
        }
        if let Some(storage) = self.storage() {
            storage.delete(&Self::storage_key(key)).await;
        }
        removed
    }

    /// Remove every entry from memory and storage
    pub async fn clear(&self) {
        let count = {
            let mut inner = self.inner.write();
            let count = inner.data.len();
            inner.data.clear();
            inner.lru_order.clear();
            count
        };
        self.stats.write().invalidations += count as u64;
        debug!("System cache CLEAR ({} entries)", count);

        if let Some(storage) = self.storage() {
            for key in storage.get_all_keys(SYSTEM_PREFIX).await {
                storage.delete(&key).await;
            }
        }
    }

    /// Load persisted entries into memory after storage attachment.
    ///
    /// Expired records are deleted from storage and skipped. Records are
    /// inserted in ascending `accessed_at` order so the recency list is
    /// meaningful, preserving recorded hits and access times. A key written
    /// in memory since construction is only replaced when the persisted
    /// record is newer (last-writer-wins by `cached_at`).
    pub async fn rehydrate(&self) {
        let Some(storage) = self.storage() else {
            return;
        };

        let mut loaded: Vec<(String, CacheEntry)> = Vec::new();
        let mut expired: Vec<String> = Vec::new();

        for (storage_key, value) in storage.get_all(SYSTEM_PREFIX).await {
            let key = storage_key[SYSTEM_PREFIX.len()..].to_string();
            let entry: CacheEntry = match serde_json::from_value(value) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable persisted entry {}: {}", storage_key, e);
                    continue;
                }
            };
            if entry.is_expired() {
                expired.push(storage_key);
            } else {
                loaded.push((key, entry));
            }
        }

        for storage_key in &expired {
            storage.delete(storage_key).await;
        }

        loaded.sort_by_key(|(_, entry)| entry.accessed_at);
        let count = loaded.len();

        let evicted = {
            let mut inner = self.inner.write();
            for (key, entry) in loaded {
                if let Some(existing) = inner.data.get(&key) {
                    if existing.cached_at >= entry.cached_at {
                        continue;
                    }
                }
                inner.data.insert(key.clone(), entry);
                inner.touch(&key);
            }
            inner.enforce_capacity()
        };
        self.record_evictions(&evicted).await;

        info!(
            "System cache rehydrated: {} entries loaded, {} expired dropped",
            count,
            expired.len()
        );
    }

    pub fn stats(&self) -> SystemCacheStats {
        let inner = self.inner.read();
        let stats = self.stats.read();
        SystemCacheStats {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            invalidations: stats.invalidations,
            expirations: stats.expirations,
            entries: inner.data.len(),
            capacity: inner.max_size,
            hit_rate: hit_rate_percent(stats.hits, stats.misses),
        }
    }
}
