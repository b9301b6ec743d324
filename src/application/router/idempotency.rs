use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Bounded-TTL set used to dedupe signals by `(scripCode, direction,
/// originTimestamp, signalKind)`. Safe to call from a single consumer task;
/// sweeps expired entries lazily on insert.
pub struct IdempotencyCache {
    ttl: Duration,
    entries: HashMap<String, DateTime<Utc>>,
}

impl IdempotencyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn contains(&self, key: &str, now: DateTime<Utc>) -> bool {
        match self.entries.get(key) {
            Some(inserted_at) => now - *inserted_at <= self.ttl,
            None => false,
        }
    }

    pub fn insert(&mut self, key: String, now: DateTime<Utc>) {
        self.sweep(now);
        self.entries.insert(key, now);
    }

    fn sweep(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.entries.retain(|_, inserted_at| now - *inserted_at <= ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_no_longer_dedupe() {
        let mut cache = IdempotencyCache::new(Duration::minutes(30));
        let t0 = Utc::now();
        cache.insert("k".to_string(), t0);
        assert!(cache.contains("k", t0 + Duration::minutes(10)));
        assert!(!cache.contains("k", t0 + Duration::minutes(31)));
    }
}
