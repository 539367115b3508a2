//! Authentication and Authorization module.
//!
//! - Argon2id password hashing
//! - HS256 bearer tokens with an injectable clock
//! - Best-effort session cache
//! - Role gate with per-operation allow-lists
//! - Route middleware and the `/users` handlers

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod rbac;
pub mod session;
pub mod token;

pub use middleware::{AuthMiddleware, BearerToken, RoleMiddleware};
pub use models::{AuthenticatedUser, Claims, Identity, NewIdentity, Role, SessionRecord};
pub use password::PasswordService;
pub use rbac::{policy, RoleGate};
pub use session::SessionCache;
pub use token::{Clock, ManualClock, SystemClock, TokenService};

use crate::config::AppConfig;
use crate::errors::{ClinicError, ClinicResult};
use crate::observability::AUTH_FAILURES;
use async_trait::async_trait;
use hyper::{Body, Request};
use models::{LoginCredentials, RegistrationData};
use password::PasswordError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a token or credential was rejected. Only the logs see this; clients
/// get one generic 401.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("token signature or format invalid")]
    InvalidToken,

    #[error("token expired")]
    ExpiredToken,

    #[error("token subject no longer exists")]
    UnknownSubject,

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("credential store failure: {0}")]
    Store(String),
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidToken => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
            AuthError::UnknownSubject => "unknown_subject",
            AuthError::Signing(_) => "signing",
            AuthError::Store(_) => "store",
        }
    }
}

impl From<AuthError> for ClinicError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::ExpiredToken | AuthError::UnknownSubject => {
                ClinicError::Unauthorized
            }
            AuthError::Signing(msg) => ClinicError::Internal(msg),
            AuthError::Store(msg) => ClinicError::Database(msg),
        }
    }
}

impl From<PasswordError> for ClinicError {
    fn from(err: PasswordError) -> Self {
        ClinicError::Internal(err.to_string())
    }
}

/// Durable user records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> ClinicResult<Option<Identity>>;

    /// Insert a user. Fails with `DuplicateUsername` if the name is taken.
    async fn create(&self, identity: NewIdentity) -> ClinicResult<Identity>;
}

/// Registration, login and bearer-token verification.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    passwords: PasswordService,
    tokens: TokenService,
    sessions: SessionCache,
    clock: Arc<dyn Clock>,
    token_ttl: Duration,
    // verified against when the username is unknown, so both failures cost the same
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn CredentialStore>,
        sessions: SessionCache,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PasswordError> {
        let passwords = PasswordService::new(&config.auth.password)?;
        let dummy_hash = passwords.hash("clinic-dummy-password")?;
        Ok(Self {
            store,
            passwords,
            tokens: TokenService::new(&config.auth.secret),
            sessions,
            clock,
            token_ttl: config.token_ttl(),
            dummy_hash,
        })
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    /// Hash off the async runtime; Argon2 is deliberately slow.
    pub async fn hash_password(&self, password: &str) -> ClinicResult<String> {
        let passwords = self.passwords.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || passwords.hash(&password))
            .await
            .map_err(|e| ClinicError::Internal(e.to_string()))?
            .map_err(ClinicError::from)
    }

    pub async fn verify_password(&self, password: &str, digest: &str) -> bool {
        let passwords = self.passwords.clone();
        let password = password.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || passwords.verify(&password, &digest))
            .await
            .unwrap_or(false)
    }

    /// Validate and store a new user.
    pub async fn register(&self, data: RegistrationData) -> ClinicResult<Identity> {
        let username = data.username.trim();
        if username.is_empty() {
            return Err(ClinicError::BadRequest("username is required".to_string()));
        }
        if data.password.is_empty() {
            return Err(ClinicError::BadRequest("password is required".to_string()));
        }
        let role = match data.role.as_deref() {
            None | Some("") => Role::default(),
            Some(raw) => raw.parse()?,
        };

        let password_hash = self.hash_password(&data.password).await?;
        let identity = self
            .store
            .create(NewIdentity {
                username: username.to_string(),
                full_name: data.full_name.filter(|n| !n.trim().is_empty()),
                role,
                password_hash,
            })
            .await?;

        tracing::info!(username = %identity.username, role = %identity.role, "user registered");
        Ok(identity)
    }

    /// Check a username/password pair. Unknown user and wrong password are
    /// the same error.
    pub async fn authenticate(&self, username: &str, password: &str) -> ClinicResult<Identity> {
        match self.store.find_by_username(username).await? {
            Some(identity) => {
                if self.verify_password(password, &identity.password_hash).await {
                    Ok(identity)
                } else {
                    tracing::warn!(username, "login rejected: wrong password");
                    Err(ClinicError::InvalidCredentials)
                }
            }
            None => {
                let _ = self.verify_password(password, &self.dummy_hash).await;
                tracing::warn!(username, "login rejected: unknown user");
                Err(ClinicError::InvalidCredentials)
            }
        }
    }

    /// Sign a token for `subject` and record a session for it.
    pub async fn issue(&self, subject: &str, role: Role) -> Result<String, AuthError> {
        let token = self
            .tokens
            .issue(subject, role, self.token_ttl, self.clock.now())?;

        let record = SessionRecord {
            username: subject.to_string(),
            role,
        };
        self.sessions.put(&token, &record).await;

        Ok(token)
    }

    pub async fn login(&self, credentials: LoginCredentials) -> ClinicResult<String> {
        let identity = self
            .authenticate(&credentials.username, &credentials.password)
            .await?;
        let token = self.issue(&identity.username, identity.role).await?;
        tracing::info!(username = %identity.username, "login succeeded");
        Ok(token)
    }

    /// Resolve a bearer token to its caller. The session cache is not consulted.
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let result = self.verify_inner(token).await;
        if let Err(ref err) = result {
            AUTH_FAILURES.with_label_values(&[err.kind()]).inc();
            tracing::warn!(kind = err.kind(), error = %err, "bearer token rejected");
        }
        result
    }

    async fn verify_inner(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.tokens.decode(token, self.clock.now())?;

        let identity = self
            .store
            .find_by_username(&claims.sub)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?
            .ok_or(AuthError::UnknownSubject)?;

        Ok(AuthenticatedUser {
            username: identity.username,
            full_name: identity.full_name,
            role: claims.role,
        })
    }
}

/// The caller attached by `AuthMiddleware`.
pub fn current_user(req: &Request<Body>) -> ClinicResult<AuthenticatedUser> {
    req.extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or(ClinicError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryCache};
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct InMemoryStore {
        users: RwLock<HashMap<String, Identity>>,
    }

    #[async_trait]
    impl CredentialStore for InMemoryStore {
        async fn find_by_username(&self, username: &str) -> ClinicResult<Option<Identity>> {
            Ok(self.users.read().await.get(username).cloned())
        }

        async fn create(&self, identity: NewIdentity) -> ClinicResult<Identity> {
            let mut users = self.users.write().await;
            if users.contains_key(&identity.username) {
                return Err(ClinicError::DuplicateUsername);
            }
            let stored = Identity {
                id: users.len() as i64 + 1,
                username: identity.username.clone(),
                full_name: identity.full_name,
                role: identity.role,
                password_hash: identity.password_hash,
                created_at: chrono::Utc::now(),
            };
            users.insert(identity.username, stored.clone());
            Ok(stored)
        }
    }

    const START: i64 = 1_700_000_000;

    fn service() -> (AuthService, Arc<ManualClock>) {
        let config = AppConfig::for_tests();
        let clock = Arc::new(ManualClock::new(START));
        let sessions = SessionCache::new(
            Cache::new(Arc::new(MemoryCache::new()), Duration::from_millis(250)),
            Duration::from_secs(config.cache.session_ttl_secs),
        );
        let service = AuthService::new(
            &config,
            Arc::new(InMemoryStore::default()),
            sessions,
            clock.clone(),
        )
        .unwrap();
        (service, clock)
    }

    fn registration(username: &str, role: Option<&str>) -> RegistrationData {
        RegistrationData {
            username: username.to_string(),
            full_name: Some("Alice Smith".to_string()),
            role: role.map(str::to_string),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_login_verify() {
        let (auth, _) = service();
        let identity = auth.register(registration("alice", Some("doctor"))).await.unwrap();
        assert_eq!(identity.role, Role::Doctor);
        assert_ne!(identity.password_hash, "secret");

        let token = auth
            .login(LoginCredentials {
                username: "alice".into(),
                password: "secret".into(),
            })
            .await
            .unwrap();

        let user = auth.verify(&token).await.unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, Role::Doctor);
        assert_eq!(user.full_name.as_deref(), Some("Alice Smith"));

        let session = auth.sessions().get(&token).await.unwrap();
        assert_eq!(session.username, "alice");
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let (auth, _) = service();
        assert!(matches!(
            auth.register(registration("bob", Some("janitor"))).await,
            Err(ClinicError::BadRequest(_))
        ));
        assert!(matches!(
            auth.register(registration("  ", None)).await,
            Err(ClinicError::BadRequest(_))
        ));
        let staff = auth.register(registration("bob", None)).await.unwrap();
        assert_eq!(staff.role, Role::Staff);
        assert!(matches!(
            auth.register(registration("bob", Some("admin"))).await,
            Err(ClinicError::DuplicateUsername)
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_the_same() {
        let (auth, _) = service();
        auth.register(registration("alice", Some("doctor"))).await.unwrap();

        let wrong = auth.authenticate("alice", "nope").await.unwrap_err();
        let unknown = auth.authenticate("mallory", "secret").await.unwrap_err();
        assert_eq!(wrong.status_code(), unknown.status_code());
        assert_eq!(wrong.detail(), unknown.detail());
    }

    #[tokio::test]
    async fn test_expiry_follows_clock() {
        let (auth, clock) = service();
        let token = auth.issue("ghost", Role::Admin).await.unwrap();
        // signature and expiry pass, but nobody is called ghost
        assert_eq!(auth.verify(&token).await, Err(AuthError::UnknownSubject));

        auth.register(registration("alice", Some("nurse"))).await.unwrap();
        let token = auth.issue("alice", Role::Nurse).await.unwrap();
        clock.advance(Duration::from_secs(24 * 3600 - 1));
        assert!(auth.verify(&token).await.is_ok());
        clock.advance(Duration::from_secs(1));
        assert_eq!(auth.verify(&token).await, Err(AuthError::ExpiredToken));
    }

    #[tokio::test]
    async fn test_role_comes_from_token() {
        let (auth, _) = service();
        auth.register(registration("alice", Some("staff"))).await.unwrap();
        let token = auth.issue("alice", Role::Doctor).await.unwrap();
        assert_eq!(auth.verify(&token).await.unwrap().role, Role::Doctor);
    }

    #[test]
    fn test_auth_error_mapping() {
        for err in [AuthError::InvalidToken, AuthError::ExpiredToken, AuthError::UnknownSubject] {
            assert!(matches!(ClinicError::from(err), ClinicError::Unauthorized));
        }
        assert!(matches!(
            ClinicError::from(AuthError::Store("down".into())),
            ClinicError::Database(_)
        ));
    }
}
