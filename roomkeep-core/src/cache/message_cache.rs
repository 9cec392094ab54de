// File: src/cache/message_cache.rs

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, trace};

use roomkeep_common::models::{CacheStats, Message};

pub const DEFAULT_CAPACITY: usize = 50;
pub const DEFAULT_TTL: Duration = Duration::from_millis(30_000);

/// One cached message list.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Arc<[Message]>,
    pub created_at: Instant,
    pub last_accessed_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) >= ttl
    }
}

/// LRU + TTL cache of derived message lists, keyed by a composite fingerprint.
///
/// Capacity and TTL are fixed at construction. Expired entries are dropped
/// lazily: on the `get` that finds them, or by the periodic `sweep`.
pub struct EntryCache {
    entries: LruCache<String, CacheEntry>,
    ttl: Duration,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Default for EntryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl EntryCache {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Presence check that neither counts as a lookup nor refreshes recency.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Returns the cached list and marks it most recently used. Absent or
    /// expired keys count as a miss; an expired entry is removed here.
    ///
    /// The returned slice is shared with the cache and is immutable.
    pub fn get(&mut self, key: &str) -> Option<Arc<[Message]>> {
        let now = Instant::now();
        let expired = match self.entries.peek(key) {
            Some(entry) => entry.is_expired(now, self.ttl),
            None => {
                self.misses += 1;
                return None;
            }
        };

        if expired {
            self.entries.pop(key);
            self.misses += 1;
            trace!("Cache entry '{}' expired on read", key);
            return None;
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_accessed_at = now;
                self.hits += 1;
                Some(entry.payload.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores a copy of `payload` under `key` and returns the shared copy.
    ///
    /// Inserting a new key into a full cache evicts the least recently
    /// accessed entry first.
    pub fn set(&mut self, key: &str, payload: &[Message]) -> Arc<[Message]> {
        let now = Instant::now();

        if !self.entries.contains(key) && self.entries.len() >= self.capacity() {
            if let Some((evicted, _)) = self.entries.pop_lru() {
                self.evictions += 1;
                debug!("Evicted least recently used cache entry '{}'", evicted);
            }
        }

        let payload: Arc<[Message]> = Arc::from(payload);
        self.entries.put(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                payload: payload.clone(),
                created_at: now,
                last_accessed_at: now,
            },
        );
        payload
    }

    /// Removes every entry whose key contains `room_id`. Returns how many
    /// were removed.
    pub fn invalidate_room(&mut self, room_id: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, _)| key.contains(room_id))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            self.entries.pop(key.as_str());
        }
        if !doomed.is_empty() {
            debug!("Invalidated {} cache entries for room '{}'", doomed.len(), room_id);
        }
        doomed.len()
    }

    /// Drops every entry and zeroes the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    /// Removes every expired entry. Hit/miss/eviction counters are untouched.
    pub fn sweep(&mut self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.pop(key.as_str());
        }
        if !expired.is_empty() {
            debug!("Swept {} expired cache entries", expired.len());
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats::new(self.hits, self.misses, self.evictions, self.entries.len())
    }

    /// Entries from most to least recently used.
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.iter().map(|(_, entry)| entry)
    }
}
