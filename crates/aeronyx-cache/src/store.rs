//! Cache store implementation.

use crate::error::{CacheError, CacheResult};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Per-namespace limits.
#[derive(Debug, Clone)]
pub struct NamespaceConfig {
    /// TTL used when `set` is called without one.
    pub default_ttl: Duration,
    /// Entry cap; the least recently used entry is evicted beyond it.
    pub max_entries: usize,
}

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Limits for namespaces without an explicit entry in `namespaces`.
    pub defaults: NamespaceConfig,
    /// Per-namespace overrides.
    pub namespaces: HashMap<String, NamespaceConfig>,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            defaults: NamespaceConfig {
                default_ttl: Duration::from_secs(300),
                max_entries: 256,
            },
            namespaces: HashMap::new(),
            event_capacity: 256,
        }
    }
}

impl CacheConfig {
    /// Add or replace a namespace override.
    #[must_use]
    pub fn with_namespace(
        mut self,
        namespace: impl Into<String>,
        default_ttl: Duration,
        max_entries: usize,
    ) -> Self {
        self.namespaces.insert(
            namespace.into(),
            NamespaceConfig {
                default_ttl,
                max_entries,
            },
        );
        self
    }

    fn namespace(&self, namespace: &str) -> &NamespaceConfig {
        self.namespaces.get(namespace).unwrap_or(&self.defaults)
    }
}

/// A cached value with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub created_at: Instant,
    pub ttl: Duration,
    pub access_count: u64,
    pub last_accessed_at: Instant,
    /// Serialized length in bytes.
    pub approx_size: usize,
}

impl CacheEntry {
    fn new(value: Value, ttl: Duration, now: Instant) -> Self {
        let approx_size = value.to_string().len();
        Self {
            value,
            created_at: now,
            ttl,
            access_count: 0,
            last_accessed_at: now,
            approx_size,
        }
    }

    /// An entry set with ttl=T is live strictly before T elapses.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }

    /// Time left before expiry.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.ttl
            .saturating_sub(now.saturating_duration_since(self.created_at))
    }
}

/// Change notification for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Set { namespace: String, key: String },
    Deleted { namespace: String, key: String },
    Expired { namespace: String, key: String },
    Evicted { namespace: String, key: String },
    Cleared { namespace: String },
}

/// Cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub approx_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Namespaced TTL cache with LRU eviction.
///
/// All operations lock internally and never hold the lock across an await,
/// so a value read before a suspension point must be re-read after it.
pub struct CacheStore {
    config: CacheConfig,
    namespaces: Mutex<HashMap<String, HashMap<String, CacheEntry>>>,
    counters: Mutex<Counters>,
    events: broadcast::Sender<CacheEvent>,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            namespaces: Mutex::new(HashMap::new()),
            counters: Mutex::new(Counters::default()),
            events,
        }
    }

    /// Subscribe to cache change events.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Get a live value, counting the access.
    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut namespaces = self.namespaces.lock();

        let Some(entries) = namespaces.get_mut(namespace) else {
            self.counters.lock().misses += 1;
            return None;
        };

        let expired = match entries.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.access_count += 1;
                entry.last_accessed_at = now;
                self.counters.lock().hits += 1;
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(key);
            let mut counters = self.counters.lock();
            counters.expirations += 1;
            counters.misses += 1;
            drop(counters);
            trace!(namespace, key, "Cache entry expired on read");
            self.emit(CacheEvent::Expired {
                namespace: namespace.to_string(),
                key: key.to_string(),
            });
        } else {
            self.counters.lock().misses += 1;
        }
        None
    }

    /// Get and deserialize a value.
    ///
    /// An entry that no longer deserializes into `T` is dropped.
    pub fn get_as<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        let value = self.get(namespace, key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(namespace, key, error = %e, "Dropping undecodable cache entry");
                self.delete(namespace, key);
                None
            }
        }
    }

    /// Remaining TTL of a live entry, without counting an access.
    pub fn ttl_remaining(&self, namespace: &str, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let namespaces = self.namespaces.lock();
        namespaces
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.remaining_at(now))
    }

    /// Insert or replace a value. `ttl = None` uses the namespace default.
    pub fn set(&self, namespace: &str, key: &str, value: Value, ttl: Option<Duration>) {
        let ns_config = self.config.namespace(namespace);
        let ttl = ttl.unwrap_or(ns_config.default_ttl);
        let max_entries = ns_config.max_entries.max(1);
        let now = Instant::now();

        let mut evicted = Vec::new();
        {
            let mut namespaces = self.namespaces.lock();
            let entries = namespaces.entry(namespace.to_string()).or_default();
            entries.insert(key.to_string(), CacheEntry::new(value, ttl, now));

            while entries.len() > max_entries {
                match Self::eviction_candidate(entries, key, now) {
                    Some(victim) => {
                        entries.remove(&victim);
                        evicted.push(victim);
                    }
                    None => break,
                }
            }
        }

        if !evicted.is_empty() {
            self.counters.lock().evictions += evicted.len() as u64;
            for victim in evicted {
                debug!(namespace, key = %victim, "Evicted least recently used cache entry");
                self.emit(CacheEvent::Evicted {
                    namespace: namespace.to_string(),
                    key: victim,
                });
            }
        }

        self.emit(CacheEvent::Set {
            namespace: namespace.to_string(),
            key: key.to_string(),
        });
    }

    /// Serialize and insert a value.
    pub fn set_as<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let value = serde_json::to_value(value).map_err(|source| CacheError::Serialize {
            namespace: namespace.to_string(),
            key: key.to_string(),
            source,
        })?;
        self.set(namespace, key, value, ttl);
        Ok(())
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&self, namespace: &str, key: &str) -> bool {
        let removed = self
            .namespaces
            .lock()
            .get_mut(namespace)
            .and_then(|entries| entries.remove(key))
            .is_some();

        if removed {
            self.emit(CacheEvent::Deleted {
                namespace: namespace.to_string(),
                key: key.to_string(),
            });
        }
        removed
    }

    /// Remove every entry of a namespace whose key matches `predicate`.
    pub fn delete_where<F>(&self, namespace: &str, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let removed: Vec<String> = {
            let mut namespaces = self.namespaces.lock();
            let Some(entries) = namespaces.get_mut(namespace) else {
                return 0;
            };
            let keys: Vec<String> = entries
                .keys()
                .filter(|k| predicate(k.as_str()))
                .cloned()
                .collect();
            for k in &keys {
                entries.remove(k);
            }
            keys
        };

        for key in &removed {
            self.emit(CacheEvent::Deleted {
                namespace: namespace.to_string(),
                key: key.clone(),
            });
        }
        removed.len()
    }

    /// Drop a whole namespace.
    pub fn clear_namespace(&self, namespace: &str) -> usize {
        let removed = self
            .namespaces
            .lock()
            .remove(namespace)
            .map(|entries| entries.len())
            .unwrap_or(0);

        self.emit(CacheEvent::Cleared {
            namespace: namespace.to_string(),
        });
        removed
    }

    /// Remove all expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut expired = Vec::new();
        {
            let mut namespaces = self.namespaces.lock();
            for (namespace, entries) in namespaces.iter_mut() {
                entries.retain(|key, entry| {
                    if entry.is_expired_at(now) {
                        expired.push((namespace.clone(), key.clone()));
                        false
                    } else {
                        true
                    }
                });
            }
            namespaces.retain(|_, entries| !entries.is_empty());
        }

        if !expired.is_empty() {
            self.counters.lock().expirations += expired.len() as u64;
            debug!(count = expired.len(), "Purged expired cache entries");
        }
        let count = expired.len();
        for (namespace, key) in expired {
            self.emit(CacheEvent::Expired { namespace, key });
        }
        count
    }

    /// Number of stored entries in a namespace (expired ones included until swept).
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .lock()
            .get(namespace)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }

    pub fn stats(&self) -> CacheStats {
        let namespaces = self.namespaces.lock();
        let counters = self.counters.lock();
        CacheStats {
            entries: namespaces.values().map(|e| e.len()).sum(),
            approx_bytes: namespaces
                .values()
                .flat_map(|e| e.values())
                .map(|entry| entry.approx_size)
                .sum(),
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            expirations: counters.expirations,
        }
    }

    /// Spawn the periodic expiry sweep. Stops when `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("Cache sweeper stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        store.purge_expired();
                    }
                }
            }
        })
    }

    /// Pick the entry to evict: expired first, then least recently used.
    /// Never picks `protect` (the entry just inserted).
    fn eviction_candidate(
        entries: &HashMap<String, CacheEntry>,
        protect: &str,
        now: Instant,
    ) -> Option<String> {
        let candidates = entries.iter().filter(|(k, _)| k.as_str() != protect);

        if let Some((k, _)) = candidates
            .clone()
            .find(|(_, entry)| entry.is_expired_at(now))
        {
            return Some(k.clone());
        }

        candidates
            .min_by_key(|(_, entry)| entry.last_accessed_at)
            .map(|(k, _)| k.clone())
    }

    fn emit(&self, event: CacheEvent) {
        // No receivers is the normal case.
        let _ = self.events.send(event);
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
