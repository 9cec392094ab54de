use std::collections::{HashMap, VecDeque};

use tracing::trace;

pub const DEFAULT_QUERY_CACHE_BOUND: usize = 100;

/// Memoizes a pure derivation keyed by its input fingerprint.
///
/// Size-bounded with no TTL. When the bound is exceeded the oldest-inserted
/// fingerprint is dropped (FIFO); reads do not change that order.
pub struct QuerySelectorCache<V> {
    entries: HashMap<String, V>,
    insertion_order: VecDeque<String>,
    bound: usize,
}

impl<V: Clone> Default for QuerySelectorCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_CACHE_BOUND)
    }
}

impl<V: Clone> QuerySelectorCache<V> {
    pub fn new(bound: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            bound: bound.max(1),
        }
    }

    /// Returns the cached value for `fingerprint`, calling `compute` only on
    /// a miss.
    pub fn get_or_compute<F>(&mut self, fingerprint: &str, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.entries.get(fingerprint) {
            return value.clone();
        }

        let value = compute();
        self.entries.insert(fingerprint.to_string(), value.clone());
        self.insertion_order.push_back(fingerprint.to_string());

        while self.entries.len() > self.bound {
            match self.insertion_order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    trace!("Query cache dropped oldest fingerprint '{}'", oldest);
                }
                None => break,
            }
        }
        value
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn hit_skips_compute() {
        let mut cache = QuerySelectorCache::new(10);
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            42
        };

        assert_eq!(cache.get_or_compute("fp", compute), 42);
        assert_eq!(cache.get_or_compute("fp", || unreachable!("cached")), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn evicts_oldest_inserted_not_least_recently_used() {
        let mut cache = QuerySelectorCache::new(2);
        cache.get_or_compute("a", || 1);
        cache.get_or_compute("b", || 2);

        // Reading "a" does not protect it under FIFO.
        cache.get_or_compute("a", || 0);
        cache.get_or_compute("c", || 3);

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn default_bound_is_one_hundred() {
        let mut cache: QuerySelectorCache<usize> = QuerySelectorCache::default();
        for i in 0..150 {
            cache.get_or_compute(&format!("fp-{}", i), || i);
        }
        assert_eq!(cache.len(), DEFAULT_QUERY_CACHE_BOUND);
        assert!(!cache.contains("fp-49"));
        assert!(cache.contains("fp-50"));
    }

    #[test]
    fn clear_empties_everything() {
        let mut cache = QuerySelectorCache::new(4);
        cache.get_or_compute("a", || 1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_compute("a", || 7), 7);
    }
}
