//! Concrete cache stores.

use super::{CacheBackend, CacheResult, CacheStats};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Default)]
struct Store {
    entries: HashMap<String, Entry>,
    stats: CacheStats,
}

impl Store {
    fn prune(&mut self, now: Instant) {
        self.entries.retain(|_, entry| entry.is_live(now));
    }
}

/// Process-local store. Every write sweeps out expired entries.
#[derive(Default)]
pub struct MemoryCache {
    store: RwLock<Store>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut store = self.store.write().await;
        let now = Instant::now();

        let hit = match store.entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                store.entries.remove(key);
                None
            }
            None => None,
        };
        if hit.is_some() {
            store.stats.hits += 1;
        } else {
            store.stats.misses += 1;
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<u64>) -> CacheResult<()> {
        let mut store = self.store.write().await;
        let now = Instant::now();
        store.prune(now);
        let expires_at = ttl.map(|secs| now + Duration::from_secs(secs));
        store
            .entries
            .insert(key.to_string(), Entry { value, expires_at });
        store.stats.sets += 1;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut store = self.store.write().await;
        let removed = store.entries.remove(key).is_some();
        if removed {
            store.stats.deletes += 1;
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let store = self.store.read().await;
        Ok(store
            .entries
            .get(key)
            .map_or(false, |entry| entry.is_live(Instant::now())))
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let mut store = self.store.write().await;
        store.prune(Instant::now());
        let mut stats = store.stats.clone();
        stats.total_keys = store.entries.len() as u64;
        Ok(stats)
    }
}

/// Backend used when caching is switched off: stores nothing, never fails.
pub struct NoopCache;

#[async_trait]
impl CacheBackend for NoopCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<u64>) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        Ok(CacheStats::default())
    }
}

#[cfg(feature = "redis")]
pub use self::redis_store::RedisCache;

#[cfg(feature = "redis")]
mod redis_store {
    use crate::cache::{CacheBackend, CacheResult, CacheStats};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Shared Redis store. Opens a connection per call.
    pub struct RedisCache {
        client: redis::Client,
        hits: AtomicU64,
        misses: AtomicU64,
        sets: AtomicU64,
        deletes: AtomicU64,
    }

    impl RedisCache {
        /// Parses `url` only; nothing is dialled until the first command.
        pub fn new(url: &str) -> CacheResult<Self> {
            Ok(Self {
                client: redis::Client::open(url)?,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                sets: AtomicU64::new(0),
                deletes: AtomicU64::new(0),
            })
        }

        async fn connect(&self) -> CacheResult<redis::aio::Connection> {
            Ok(self.client.get_async_connection().await?)
        }
    }

    #[async_trait]
    impl CacheBackend for RedisCache {
        async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
            let mut conn = self.connect().await?;
            let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
            let counter = if value.is_some() { &self.hits } else { &self.misses };
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(value)
        }

        async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<u64>) -> CacheResult<()> {
            let mut conn = self.connect().await?;
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value);
            if let Some(secs) = ttl {
                cmd.arg("EX").arg(secs);
            }
            cmd.query_async::<_, ()>(&mut conn).await?;
            self.sets.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn delete(&self, key: &str) -> CacheResult<bool> {
            let mut conn = self.connect().await?;
            let removed: u64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
            if removed > 0 {
                self.deletes.fetch_add(1, Ordering::Relaxed);
            }
            Ok(removed > 0)
        }

        async fn exists(&self, key: &str) -> CacheResult<bool> {
            let mut conn = self.connect().await?;
            let found: u64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
            Ok(found > 0)
        }

        async fn stats(&self) -> CacheResult<CacheStats> {
            let mut conn = self.connect().await?;
            let total_keys: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
            Ok(CacheStats {
                hits: self.hits.load(Ordering::Relaxed),
                misses: self.misses.load(Ordering::Relaxed),
                sets: self.sets.load(Ordering::Relaxed),
                deletes: self.deletes.load(Ordering::Relaxed),
                total_keys,
            })
        }
    }
}
