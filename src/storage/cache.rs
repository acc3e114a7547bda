//! Cache tier contract and an in-memory reference implementation
//!
//! The engine runs against three independent tiers (session, memory,
//! compression results), each with its own TTL. Eviction policy beyond
//! expire-at-read stays a deployment concern behind the trait.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

/// Cache hit/miss counters and current size
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate in [0, 1]; 0 when nothing was looked up yet
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A single cache tier
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Fetch a value, `None` on miss or expiry
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store a value with optional invalidation tags
    async fn set(&self, key: &str, value: Value, tags: &[String]);

    /// Remove a key, returning whether it was present
    async fn delete(&self, key: &str) -> bool;

    /// Remove every entry carrying `tag`, returning the count removed
    async fn invalidate_tag(&self, tag: &str) -> usize;

    /// Current counters
    async fn stats(&self) -> CacheStats;
}

struct CacheEntry {
    value: Value,
    tags: Vec<String>,
    inserted_at: Instant,
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// In-memory cache with expire-at-read TTL
pub struct InMemoryCache {
    ttl: Option<Duration>,
    state: RwLock<CacheState>,
}

impl InMemoryCache {
    /// Create a cache; `ttl = None` means entries never expire
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        match self.ttl {
            Some(ttl) => entry.inserted_at.elapsed() > ttl,
            None => false,
        }
    }
}

#[async_trait]
impl CacheTier for InMemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut state = self.state.write().await;

        let expired = match state.entries.get(key) {
            Some(entry) => self.is_expired(entry),
            None => {
                state.misses += 1;
                return None;
            }
        };

        if expired {
            state.entries.remove(key);
            state.misses += 1;
            return None;
        }

        state.hits += 1;
        state.entries.get(key).map(|e| e.value.clone())
    }

    async fn set(&self, key: &str, value: Value, tags: &[String]) {
        let mut state = self.state.write().await;
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                tags: tags.to_vec(),
                inserted_at: Instant::now(),
            },
        );
    }

    async fn delete(&self, key: &str) -> bool {
        self.state.write().await.entries.remove(key).is_some()
    }

    async fn invalidate_tag(&self, tag: &str) -> usize {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|_, e| !e.tags.iter().any(|t| t == tag));
        before - state.entries.len()
    }

    async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
        }
    }
}

/// TTLs for the three cache tiers
#[derive(Debug, Clone)]
pub struct CacheTiersConfig {
    pub session_ttl: Option<Duration>,
    pub memory_ttl: Option<Duration>,
    pub compression_ttl: Option<Duration>,
}

impl Default for CacheTiersConfig {
    fn default() -> Self {
        Self {
            session_ttl: Some(Duration::from_secs(30 * 60)),
            memory_ttl: Some(Duration::from_secs(60 * 60)),
            compression_ttl: Some(Duration::from_secs(10 * 60)),
        }
    }
}

/// The three independent cache tiers the engine runs against
#[derive(Clone)]
pub struct CacheTiers {
    pub session: Arc<dyn CacheTier>,
    pub memory: Arc<dyn CacheTier>,
    pub compression: Arc<dyn CacheTier>,
}

impl CacheTiers {
    /// Build all three tiers on the in-memory implementation
    pub fn in_memory(config: CacheTiersConfig) -> Self {
        Self {
            session: Arc::new(InMemoryCache::new(config.session_ttl)),
            memory: Arc::new(InMemoryCache::new(config.memory_ttl)),
            compression: Arc::new(InMemoryCache::new(config.compression_ttl)),
        }
    }
}
