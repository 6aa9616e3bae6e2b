//! Weighted LRU caches.
//!
//! [`LruCache`] bounds its contents by the summed *weight* of its entries
//! rather than by entry count: the pixel cache weighs rendered frame sets by
//! their byte footprint, the recipe cache weighs every recipe as 1.
//!
//! [`SharedCache`] wraps an `LruCache` for use from several threads. All
//! access goes through one mutex, and builds are de-duplicated per key: while
//! one caller is building the value for a key, other callers asking for the
//! same key wait for that build instead of starting their own.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::CastResult;

// ============================================================================
// CacheStats
// ============================================================================

/// Cumulative cache counters, kept for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

// ============================================================================
// LruCache
// ============================================================================

struct Entry<V> {
    value: V,
    weight: usize,
    last_access: u64,
}

/// A least-recently-used cache bounded by total entry weight.
///
/// Inserting evicts least recently used entries until the new entry fits.
/// An entry heavier than the whole budget is still stored, alone.
pub struct LruCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    budget: usize,
    weight: usize,
    tick: u64,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    pub fn new(budget: usize) -> Self {
        Self {
            entries: HashMap::new(),
            budget,
            weight: 0,
            tick: 0,
            stats: CacheStats::default(),
        }
    }

    /// Looks up an entry, marking it as most recently used.
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.tick += 1;
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_access = self.tick;
                self.stats.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Looks up an entry without touching recency or counters.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn insert(&mut self, key: K, value: V, weight: usize) {
        self.remove(&key);

        while self.weight + weight > self.budget && !self.entries.is_empty() {
            self.evict_one();
        }

        self.tick += 1;
        self.weight += weight;
        self.entries.insert(
            key,
            Entry {
                value,
                weight,
                last_access: self.tick,
            },
        );
        self.stats.insertions += 1;
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.weight = self.weight.saturating_sub(entry.weight);
        Some(entry.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.weight = 0;
    }

    fn evict_one(&mut self) {
        let lru_key = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(k, _)| k.clone());

        if let Some(key) = lru_key {
            self.remove(&key);
            self.stats.evictions += 1;
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summed weight of all entries.
    pub fn weight(&self) -> usize {
        self.weight
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

// ============================================================================
// SharedCache
// ============================================================================

/// A thread-safe [`LruCache`] that builds each missing value only once.
pub struct SharedCache<K, V> {
    lru: Mutex<LruCache<K, V>>,
    inflight: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> SharedCache<K, V> {
    pub fn new(budget: usize) -> Self {
        Self {
            lru: Mutex::new(LruCache::new(budget)),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    // Cached values are immutable once inserted, so a poisoned lock still
    // guards a consistent map.
    fn lock_lru(&self) -> MutexGuard<'_, LruCache<K, V>> {
        self.lru.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock_lru().get(key)
    }

    pub fn insert(&self, key: K, value: V, weight: usize) {
        self.lock_lru().insert(key, value, weight);
    }

    /// Returns the cached value for `key`, building and inserting it on a miss.
    ///
    /// Concurrent callers for the same key wait for a single build. A failed
    /// build inserts nothing, so a later call retries.
    pub fn get_or_try_insert_with<B, W>(&self, key: &K, build: B, weigh: W) -> CastResult<V>
    where
        B: FnOnce() -> CastResult<V>,
        W: FnOnce(&V) -> usize,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let slot = self.inflight_slot(key);
        let result = {
            let _building = slot.lock().unwrap_or_else(PoisonError::into_inner);
            let finished = self.lock_lru().peek(key).cloned();
            match finished {
                Some(value) => Ok(value),
                None => build().map(|value| {
                    let weight = weigh(&value);
                    self.insert(key.clone(), value.clone(), weight);
                    value
                }),
            }
        };
        self.release_slot(key, slot);
        result
    }

    fn inflight_slot(&self, key: &K) -> Arc<Mutex<()>> {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone()
    }

    // Slots are cloned and dropped only under the inflight lock, so the
    // strong count seen here is exact.
    fn release_slot(&self, key: &K, slot: Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        drop(slot);
        if inflight.get(key).is_some_and(|s| Arc::strong_count(s) == 1) {
            inflight.remove(key);
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock_lru().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock_lru().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_lru().is_empty()
    }

    pub fn weight(&self) -> usize {
        self.lock_lru().weight()
    }

    pub fn budget(&self) -> usize {
        self.lock_lru().budget()
    }

    pub fn stats(&self) -> CacheStats {
        self.lock_lru().stats()
    }

    pub fn clear(&self) {
        self.lock_lru().clear();
    }
}
