//! Shared helpers for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use clinic::auth::ManualClock;
use clinic::cache::{CacheBackend, CacheError, CacheResult, CacheStats, MemoryCache};
use clinic::database::Database;
use clinic::{api, AppConfig, AppContext, Router};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Method, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;

pub const START: i64 = 1_900_000_000;

/// Backend that is always down.
pub struct FailingCache;

#[async_trait]
impl CacheBackend for FailingCache {
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

pub struct TestApp {
    pub ctx: Arc<AppContext>,
    pub router: Router,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_backend(Arc::new(MemoryCache::new())).await
    }

    pub async fn with_failing_cache() -> Self {
        Self::with_backend(Arc::new(FailingCache)).await
    }

    pub async fn with_backend(backend: Arc<dyn CacheBackend>) -> Self {
        let config = AppConfig::for_tests();
        let db = Database::in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(START));
        let ctx = Arc::new(AppContext::from_parts(config, db, backend, clock.clone()).unwrap());
        let router = api::routes(&ctx);
        Self { ctx, router, clock }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.handle(req, self.ctx.clone()).await;
        let status = resp.status();
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn register(&self, username: &str, password: &str, role: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/users/create",
            None,
            Some(serde_json::json!({
                "username": username,
                "full_name": format!("{} Test", username),
                "role": role,
                "password": password,
            })),
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/users/token")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username={}&password={}", username, password)))
            .unwrap();
        self.send(req).await
    }

    /// Register and log in, returning the bearer token.
    pub async fn user_token(&self, username: &str, role: &str) -> String {
        let (status, _) = self.register(username, "secret", role).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = self.login(username, "secret").await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }
}
