use std::time::{Duration, Instant};

use dashmap::DashMap;

struct CacheEntry {
    expires_at: Instant,
    value: serde_json::Value,
}

/// In-process TTL cache for read endpoints. Owned by the server; entries
/// are evicted on access and by a bounded background timer.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    enabled: bool,
}

impl ResponseCache {
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl, enabled }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        if !self.enabled {
            return None;
        }
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn put(&self, key: &str, value: serde_json::Value) {
        if !self.enabled {
            return;
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry { expires_at: Instant::now() + self.ttl, value },
        );
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    /// Eviction interval for the background purge task.
    pub fn purge_period(&self) -> Duration {
        self.ttl.max(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_cache_stores_nothing() {
        let cache = ResponseCache::new(false, Duration::from_secs(60));
        cache.put("k", serde_json::json!(1));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn hit_within_ttl() {
        let cache = ResponseCache::new(true, Duration::from_secs(60));
        cache.put("k", serde_json::json!({"pxi": 0.5}));
        assert_eq!(cache.get("k").unwrap()["pxi"], 0.5);
    }

    #[test]
    fn expired_entries_are_evicted_on_access() {
        let cache = ResponseCache::new(true, Duration::from_millis(0));
        cache.put("k", serde_json::json!(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
        assert!(cache.entries.is_empty());
    }

    #[test]
    fn purge_removes_expired_entries() {
        let cache = ResponseCache::new(true, Duration::from_millis(0));
        cache.put("a", serde_json::json!(1));
        cache.put("b", serde_json::json!(2));
        std::thread::sleep(Duration::from_millis(5));
        cache.purge_expired();
        assert!(cache.entries.is_empty());
    }
}
