use std::hash::Hash;
use std::time::{Duration, Instant};

use lru::LruCache;

/// A small LRU-backed cache with a uniform per-entry TTL, used by the RPC
/// client for the balance (10s), computor-list (1h), and revenue-donation
/// (10min) caches (spec §4.2). Capacity bounds memory; TTL bounds staleness.
pub struct TtlCache<K, V> {
    inner: LruCache<K, (V, Instant)>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: LruCache::new(capacity),
            ttl,
        }
    }

    /// Returns the cached value if present and not expired. Expired entries
    /// are returned by [`get_stale`] instead — callers use that on the
    /// error path to fall back to "cached value if any" (spec §4.2: cache
    /// failures are never fatal).
    pub fn get(&mut self, key: &K) -> Option<V> {
        let ttl = self.ttl;
        match self.inner.get(key) {
            Some((value, inserted_at)) if inserted_at.elapsed() < ttl => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the cached value regardless of expiry, for the
    /// RPC-error-falls-back-to-last-known-value path.
    pub fn get_stale(&mut self, key: &K) -> Option<V> {
        self.inner.get(key).map(|(value, _)| value.clone())
    }

    pub fn put(&mut self, key: K, value: V) {
        self.inner.put(key, (value, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_value_is_returned_until_ttl_elapses() {
        let mut cache: TtlCache<&str, u64> = TtlCache::new(4, Duration::from_millis(20));
        cache.put("a", 10);
        assert_eq!(cache.get(&"a"), Some(10));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get_stale(&"a"), Some(10));
    }

    #[test]
    fn missing_key_returns_none() {
        let mut cache: TtlCache<&str, u64> = TtlCache::new(4, Duration::from_secs(1));
        assert_eq!(cache.get(&"missing"), None);
        assert_eq!(cache.get_stale(&"missing"), None);
    }
}
