use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use crate::clock::Clock;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub cached_at_ms: i64,
}

/// Keyed cache with one TTL per instance.
///
/// Stale entries read as absent but are only removed by the pruning pass that runs once the
/// map grows past `max_entries`. Fresh entries are never evicted, so the map may exceed the
/// soft bound until entries age out.
pub struct TtlCache<V> {
    name: &'static str,
    ttl_ms: i64,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl_ms: ttl.as_millis() as i64,
            max_entries,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms.max(0) as u64)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_millis();
        self.lock()
            .get(key)
            .filter(|entry| now - entry.cached_at_ms < self.ttl_ms)
            .map(|entry| entry.value.clone())
    }

    /// Store `value`, replacing any previous entry for `key`.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let now = self.clock.now_millis();
        let mut entries = self.lock();
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                cached_at_ms: now,
            },
        );
        if entries.len() > self.max_entries {
            self.prune_locked(&mut entries, now);
        }
    }

    /// Drop every stale entry. Returns how many were removed.
    pub fn prune_stale(&self) -> usize {
        let now = self.clock.now_millis();
        let mut entries = self.lock();
        self.prune_locked(&mut entries, now)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune_locked(&self, entries: &mut HashMap<String, CacheEntry<V>>, now: i64) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| now - entry.cached_at_ms < self.ttl_ms);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(cache = self.name, removed, remaining = entries.len(), "pruned stale cache entries");
        }
        removed
    }

    // A panic while holding the lock leaves plain data behind; keep serving it
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
