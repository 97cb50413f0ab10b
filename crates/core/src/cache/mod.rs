use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Cached value with its insertion time
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Concurrent map with per-entry time-to-live expiry.
///
/// Backs the pool list, swap quote and oracle quote caches. Reads are
/// lock-free for the common hit path; expired entries are dropped lazily
/// on access.
#[derive(Debug)]
pub struct TtlCache<K: Eq + Hash, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache whose entries expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns the cached value if present and still fresh
    pub fn get(&self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.stored_at.elapsed() < self.ttl {
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Stores a value, replacing any previous entry for the key
    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops the entry for a key regardless of freshness
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Drops every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Removes entries past their TTL, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        before - self.entries.len()
    }

    /// Number of entries currently held, fresh or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
