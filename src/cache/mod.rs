//! # Caching Module
//!
//! A `CacheBackend` stores raw bytes (memory or Redis). `Cache` sits on top of
//! a backend and makes every call best effort: each operation is bounded by a
//! timeout, failures are logged and counted, and nothing ever propagates to the
//! caller. A missing cache only costs performance.

pub mod backends;

pub use backends::*;

use crate::config::{CacheBackendKind, CacheConfig};
use crate::observability::CACHE_UNAVAILABLE;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub type CacheResult<T> = Result<T, CacheError>;

/// Backend failures. Never surfaced past `Cache`.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend not available")]
    BackendUnavailable,

    #[error("Cache operation timed out")]
    Timeout,
}

/// Raw byte store behind `Cache`. Errors mean the store could not answer.
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// `ttl` is in seconds; `None` keeps the entry until deleted.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<u64>) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<bool>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    async fn stats(&self) -> CacheResult<CacheStats>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub total_keys: u64,
}

/// Outcome of a cache read. `Absent` and `Unavailable` look the same to
/// callers that only want an `Option`, but stay distinct for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Present(T),
    Absent,
    Unavailable,
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Present(value) => Some(value),
            Lookup::Absent | Lookup::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Lookup::Unavailable)
    }
}

/// Build the configured backend. An unreachable Redis is not an error here:
/// the client connects lazily and failures surface as unavailability later.
pub fn build_backend(config: &CacheConfig, redis_url: &str) -> CacheResult<Arc<dyn CacheBackend>> {
    match config.backend {
        CacheBackendKind::Memory => Ok(Arc::new(MemoryCache::new())),
        CacheBackendKind::Disabled => Ok(Arc::new(NoopCache)),
        #[cfg(feature = "redis")]
        CacheBackendKind::Redis => Ok(Arc::new(RedisCache::new(redis_url)?)),
        #[cfg(not(feature = "redis"))]
        CacheBackendKind::Redis => {
            tracing::warn!(url = %redis_url, "redis support not compiled in, falling back to memory cache");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

/// Best-effort, JSON-encoding cache front.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    timeout: Duration,
    key_prefix: String,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            key_prefix: String::new(),
        }
    }

    pub fn from_config(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self::new(backend, Duration::from_millis(config.timeout_ms)).with_prefix(&config.key_prefix)
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn bounded<T, F>(&self, op: &'static str, key: &str, fut: F) -> Option<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        let err = match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(err)) => err,
            Err(_) => CacheError::Timeout,
        };
        CACHE_UNAVAILABLE.inc();
        tracing::warn!(op, key, error = %err, "cache unavailable");
        None
    }

    /// Read and decode a value. An undecodable entry counts as absent.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let key = self.key(key);
        match self.bounded("get", &key, self.backend.get(&key)).await {
            None => Lookup::Unavailable,
            Some(None) => Lookup::Absent,
            Some(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Lookup::Present(value),
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "discarding undecodable cache entry");
                    Lookup::Absent
                }
            },
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key).await.into_option()
    }

    /// Store a value. Returns whether the write reached the backend.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let key = self.key(key);
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "value not cacheable");
                return false;
            }
        };
        let ttl = ttl.map(|t| t.as_secs().max(1));
        self.bounded("set", &key, self.backend.set(&key, bytes, ttl))
            .await
            .is_some()
    }

    pub async fn delete(&self, key: &str) -> bool {
        let key = self.key(key);
        self.bounded("delete", &key, self.backend.delete(&key))
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct DownCache;

    #[async_trait]
    impl CacheBackend for DownCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
            Err(CacheError::BackendUnavailable)
        }
        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<u64>) -> CacheResult<()> {
            Err(CacheError::BackendUnavailable)
        }
        async fn delete(&self, _key: &str) -> CacheResult<bool> {
            Err(CacheError::BackendUnavailable)
        }
        async fn exists(&self, _key: &str) -> CacheResult<bool> {
            Err(CacheError::BackendUnavailable)
        }
        async fn stats(&self) -> CacheResult<CacheStats> {
            Err(CacheError::BackendUnavailable)
        }
    }

    struct SlowCache;

    #[async_trait]
    impl CacheBackend for SlowCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<u64>) -> CacheResult<()> {
            tokio::time::sleep(Duration::from_secs(10)).await;
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

    #[tokio::test]
    async fn test_roundtrip_with_prefix() {
        let backend = Arc::new(MemoryCache::new());
        let cache = Cache::new(backend.clone(), Duration::from_millis(250)).with_prefix("clinic:");

        assert!(cache.set("patient:1", &serde_json::json!({"id": 1}), None).await);
        assert!(backend.exists("clinic:patient:1").await.unwrap());

        let value: Option<serde_json::Value> = cache.get("patient:1").await;
        assert_eq!(value.unwrap()["id"], 1);

        assert!(cache.delete("patient:1").await);
        assert_eq!(cache.lookup::<serde_json::Value>("patient:1").await, Lookup::Absent);
    }

    #[tokio::test]
    async fn test_failing_backend_is_unavailable() {
        let cache = Cache::new(Arc::new(DownCache), Duration::from_millis(250));
        assert!(!cache.set("k", &1u32, None).await);
        assert_eq!(cache.lookup::<u32>("k").await, Lookup::Unavailable);
        assert_eq!(cache.get::<u32>("k").await, None);
        assert!(!cache.delete("k").await);
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let cache = Cache::new(Arc::new(SlowCache), Duration::from_millis(20));
        let started = std::time::Instant::now();
        assert!(cache.lookup::<u32>("k").await.is_unavailable());
        assert!(!cache.set("k", &1u32, None).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_absent() {
        let backend = Arc::new(MemoryCache::new());
        backend.set("k", b"not json".to_vec(), None).await.unwrap();
        let cache = Cache::new(backend, Duration::from_millis(250));
        assert_eq!(cache.lookup::<u32>("k").await, Lookup::Absent);
    }

    #[test]
    fn test_build_backend_memory_and_disabled() {
        let mut config = CacheConfig::default();
        config.backend = CacheBackendKind::Memory;
        assert!(build_backend(&config, "redis://localhost:6379/10").is_ok());
        config.backend = CacheBackendKind::Disabled;
        assert!(build_backend(&config, "redis://localhost:6379/10").is_ok());
    }
}
