//! Application context handed to every handler.
//!
//! Built once at startup (or per test) and shared as `Arc<AppContext>`.

use crate::auth::{AuthService, Clock, SessionCache, SystemClock};
use crate::cache::{build_backend, Cache, CacheBackend};
use crate::config::AppConfig;
use crate::database::{
    AppointmentRepository, Database, MedicineRepository, PatientRepository, ReportRepository,
    UserRepository,
};
use std::sync::Arc;
use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: Database,
    pub auth: Arc<AuthService>,
    pub cache: Cache,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    /// Open the configured database and cache backend.
    pub async fn build(config: AppConfig) -> Result<Self, BoxError> {
        let db = Database::open(&config.database.url).await?;
        let backend = build_backend(&config.cache, &config.redis_url())?;
        Self::from_parts(config, db, backend, Arc::new(SystemClock))
    }

    /// Assemble from already constructed parts.
    pub fn from_parts(
        config: AppConfig,
        db: Database,
        backend: Arc<dyn CacheBackend>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BoxError> {
        let cache = Cache::from_config(backend, &config.cache);
        let sessions = SessionCache::new(
            cache.clone(),
            Duration::from_secs(config.cache.session_ttl_secs),
        );
        let auth = AuthService::new(
            &config,
            Arc::new(UserRepository::new(db.clone())),
            sessions,
            clock.clone(),
        )?;

        Ok(Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
            cache,
            clock,
        })
    }

    /// Default TTL for read-through caching.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.config.cache.default_ttl_secs)
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp(self.clock.now(), 0).unwrap_or_else(chrono::Utc::now)
    }

    pub fn patients(&self) -> PatientRepository {
        PatientRepository::new(self.db.clone())
    }

    pub fn appointments(&self) -> AppointmentRepository {
        AppointmentRepository::new(self.db.clone())
    }

    pub fn medicines(&self) -> MedicineRepository {
        MedicineRepository::new(self.db.clone())
    }

    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.db.clone())
    }
}
