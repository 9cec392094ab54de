use serde::{Deserialize, Serialize};

/// Counters reported by the message-list cache.
///
/// `hits`, `misses` and `evictions` only grow; an explicit clear of the
/// cache is the one thing that resets them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn new(hits: u64, misses: u64, evictions: u64, size: usize) -> Self {
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };
        Self { hits, misses, evictions, size, hit_rate }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_zero_without_lookups() {
        assert_eq!(CacheStats::new(0, 0, 0, 0).hit_rate, 0.0);
    }

    #[test]
    fn hit_rate_is_hits_over_lookups() {
        let stats = CacheStats::new(3, 1, 0, 2);
        assert!((stats.hit_rate - 0.75).abs() < f64::EPSILON);
    }
}
