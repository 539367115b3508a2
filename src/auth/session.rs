//! Session cache for issued tokens.
//!
//! Records are advisory: token verification never reads them. Every
//! operation is best effort, so a cache outage degrades to "no session"
//! rather than an error.

use super::models::SessionRecord;
use crate::cache::{Cache, Lookup};
use std::time::Duration;

/// Best-effort store of `session:<token>` records.
#[derive(Clone)]
pub struct SessionCache {
    cache: Cache,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(cache: Cache, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(token: &str) -> String {
        format!("session:{}", token)
    }

    /// Store a record for `token`. Failures are logged, never returned.
    pub async fn put(&self, token: &str, record: &SessionRecord) {
        self.put_with_ttl(token, record, self.ttl).await;
    }

    pub async fn put_with_ttl(&self, token: &str, record: &SessionRecord, ttl: Duration) {
        if !self.cache.set(&Self::key(token), record, Some(ttl)).await {
            tracing::warn!(username = %record.username, "session record not stored");
        }
    }

    /// Three-way lookup, for callers that care why a record is missing.
    pub async fn lookup(&self, token: &str) -> Lookup<SessionRecord> {
        self.cache.lookup(&Self::key(token)).await
    }

    /// The record for `token`, if the cache has it and is reachable.
    pub async fn get(&self, token: &str) -> Option<SessionRecord> {
        self.lookup(token).await.into_option()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;
    use crate::cache::{CacheBackend, CacheError, CacheResult, CacheStats, MemoryCache};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Unreachable;

    #[async_trait]
    impl CacheBackend for Unreachable {
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

    fn record() -> SessionRecord {
        SessionRecord {
            username: "alice".to_string(),
            role: Role::Doctor,
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let backend = Arc::new(MemoryCache::new());
        let sessions = SessionCache::new(
            Cache::new(backend.clone(), Duration::from_millis(250)),
            Duration::from_secs(86_400),
        );

        sessions.put("tok", &record()).await;
        assert_eq!(sessions.get("tok").await, Some(record()));
        assert!(backend.exists("session:tok").await.unwrap());
        assert_eq!(sessions.lookup("other").await, Lookup::Absent);
    }

    #[tokio::test]
    async fn test_record_expires_with_ttl() {
        let sessions = SessionCache::new(
            Cache::new(Arc::new(MemoryCache::new()), Duration::from_millis(250)),
            Duration::from_secs(86_400),
        );
        sessions
            .put_with_ttl("tok", &record(), Duration::from_secs(1))
            .await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(sessions.get("tok").await, None);
    }

    #[tokio::test]
    async fn test_outage_is_silent() {
        let sessions = SessionCache::new(
            Cache::new(Arc::new(Unreachable), Duration::from_millis(250)),
            Duration::from_secs(86_400),
        );
        sessions.put("tok", &record()).await;
        assert_eq!(sessions.lookup("tok").await, Lookup::Unavailable);
        assert_eq!(sessions.get("tok").await, None);
    }
}
