//! Response Cache
//!
//! Short-lived reply cache keyed by normalized message text. Entries expire
//! after a fixed TTL; moka evicts them lazily so no timers are spawned.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const MAX_ENTRIES: u64 = 10_000;

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
}

/// Reply cache shared by the composer
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<String, String>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl ResponseCache {
    /// Create new cache with TTL
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .time_to_live(ttl)
            .build();

        Self {
            cache,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Lookup key: trimmed, lower-cased text
    pub fn key(text: &str) -> String {
        text.trim().to_lowercase()
    }

    /// Get cached reply
    pub async fn get(&self, text: &str) -> Option<String> {
        let key = Self::key(text);
        match self.cache.get(&key).await {
            Some(reply) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache HIT: {:?}", key);
                Some(reply)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Whether a live entry exists, without touching hit/miss counters
    pub fn contains(&self, text: &str) -> bool {
        self.cache.contains_key(&Self::key(text))
    }

    /// Store reply in cache
    pub async fn set(&self, text: &str, reply: &str) {
        let key = Self::key(text);
        debug!("Cache SET: {:?}", key);
        self.cache.insert(key, reply.to_string()).await;
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            entries: self.cache.entry_count(),
            hits,
            misses,
            hit_rate_percent: if total > 0 {
                (hits as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        }
    }
}
