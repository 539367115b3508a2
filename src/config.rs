//! Runtime settings.
//!
//! Values are layered from built-in defaults, optional YAML/TOML files and
//! environment variables (`CLINIC__SECTION__KEY`). The short legacy variables
//! `CLINIC_SECRET`, `REDIS_HOST`, `REDIS_PORT` and `REDIS_DB` are honoured on top.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Signing secret used when none is supplied. Rejected in production.
pub const INSECURE_DEFAULT_SECRET: &str = "change-this-secret";

const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Everything the binary needs to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: RunEnvironment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunEnvironment {
    Development,
    Test,
    Production,
}

/// Listen address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration. `url` is a SQLite file path or `:memory:`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Token signing and password hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub secret: String,
    pub token_ttl_hours: i64,
    pub password: PasswordConfig,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Memory,
    Redis,
    Disabled,
}

/// Cache / session store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: u8,
    pub default_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub timeout_ms: u64,
    pub key_prefix: String,
}

/// `level` is an `EnvFilter` directive; `format` is `json` or `pretty`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        // Argon2id defaults: 19 MiB, 2 passes, 1 lane
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Redis,
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_db: 10,
            default_ttl_secs: 300,
            session_ttl_secs: 86_400,
            timeout_ms: 250,
            key_prefix: String::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: RunEnvironment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            database: DatabaseConfig {
                url: "clinic.db".to_string(),
            },
            auth: AuthConfig {
                secret: INSECURE_DEFAULT_SECRET.to_string(),
                token_ttl_hours: 24,
                password: PasswordConfig::default(),
            },
            cache: CacheConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration with priority (highest first):
    /// 1. Legacy variables (`CLINIC_SECRET`, `REDIS_*`)
    /// 2. `CLINIC__*` environment variables
    /// 3. `config.yml` / `config.toml` in the working directory
    /// 4. `config/local.*`, `config/default.*`
    /// 5. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new(".env").exists() {
            dotenvy::dotenv().ok();
        }

        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if Path::new("config.yml").exists() || Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        let builder = builder
            .add_source(Environment::with_prefix("CLINIC").prefix_separator("__").separator("__"))
            .set_override_option("auth.secret", std::env::var("CLINIC_SECRET").ok())?
            .set_override_option("cache.redis_host", std::env::var("REDIS_HOST").ok())?
            .set_override_option("cache.redis_port", std::env::var("REDIS_PORT").ok())?
            .set_override_option("cache.redis_db", std::env::var("REDIS_DB").ok())?;

        builder.build()?.try_deserialize()
    }

    /// Load configuration from a specific file layered over the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("CLINIC").prefix_separator("__").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Configuration suited to tests: in-memory database, memory cache,
    /// cheap password hashing.
    pub fn for_tests() -> Self {
        let mut config = AppConfig::default();
        config.environment = RunEnvironment::Test;
        config.database.url = ":memory:".to_string();
        config.auth.secret = "test-secret-key-that-is-long-enough-for-hs256".to_string();
        config.auth.password = PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };
        config.cache.backend = CacheBackendKind::Memory;
        config
    }

    /// `host:port` to bind.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.token_ttl_hours.max(0) as u64 * 3600)
    }

    pub fn redis_url(&self) -> String {
        format!(
            "redis://{}:{}/{}",
            self.cache.redis_host, self.cache.redis_port, self.cache.redis_db
        )
    }

    pub fn uses_insecure_secret(&self) -> bool {
        self.auth.secret.is_empty() || self.auth.secret == INSECURE_DEFAULT_SECRET
    }

    /// Reject settings the server must not start with.
    pub fn validate(&self) -> Result<(), String> {
        if self.environment == RunEnvironment::Production {
            if self.uses_insecure_secret() {
                return Err("auth.secret must be supplied externally in production".to_string());
            }
            if self.auth.secret.len() < MIN_PRODUCTION_SECRET_LEN {
                return Err(format!(
                    "auth.secret must be at least {} characters long in production",
                    MIN_PRODUCTION_SECRET_LEN
                ));
            }
        } else if self.uses_insecure_secret() {
            tracing::warn!("using the built-in development signing secret; never deploy this configuration");
        }

        if self.auth.secret.is_empty() {
            return Err("auth.secret cannot be empty".to_string());
        }

        if self.auth.token_ttl_hours <= 0 {
            return Err("auth.token_ttl_hours must be positive".to_string());
        }

        if self.cache.default_ttl_secs == 0 || self.cache.session_ttl_secs == 0 {
            return Err("cache TTLs must be positive".to_string());
        }

        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        Ok(())
    }
}
