//! Authentication middleware for protecting routes.
//!
//! `AuthMiddleware` resolves the bearer token and attaches the caller to the
//! request; `RoleMiddleware` runs after it and applies an allow-list.

use crate::auth::models::{AuthenticatedUser, Role};
use crate::auth::rbac::RoleGate;
use crate::auth::AuthService;
use crate::errors::ClinicError;
use crate::middleware::Middleware;
use hyper::{header::AUTHORIZATION, Body, HeaderMap, Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The raw bearer token of an authenticated request.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Authentication middleware for bearer tokens
pub struct AuthMiddleware {
    auth: Arc<AuthService>,
}

impl AuthMiddleware {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self { auth }
    }

    /// Extract the token from `Authorization: Bearer <token>`
    fn extract_token(headers: &HeaderMap) -> Option<String> {
        headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| {
                h.strip_prefix("Bearer ")
                    .or_else(|| h.strip_prefix("bearer "))
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

impl Middleware for AuthMiddleware {
    fn before(
        &self,
        mut req: Request<Body>,
    ) -> Pin<Box<dyn Future<Output = Result<Request<Body>, Response<Body>>> + Send + '_>> {
        Box::pin(async move {
            let token = match Self::extract_token(req.headers()) {
                Some(token) => token,
                None => {
                    tracing::debug!(path = %req.uri().path(), "missing bearer token");
                    return Err(ClinicError::Unauthorized.into_response());
                }
            };

            match self.auth.verify(&token).await {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                    req.extensions_mut().insert(BearerToken(token));
                    Ok(req)
                }
                Err(err) => Err(ClinicError::from(err).into_response()),
            }
        })
    }
}

/// Allow-list check; must be installed after `AuthMiddleware`.
pub struct RoleMiddleware {
    allowed: &'static [Role],
}

impl RoleMiddleware {
    pub fn new(allowed: &'static [Role]) -> Self {
        Self { allowed }
    }
}

impl Middleware for RoleMiddleware {
    fn before(
        &self,
        req: Request<Body>,
    ) -> Pin<Box<dyn Future<Output = Result<Request<Body>, Response<Body>>> + Send + '_>> {
        let allowed = self.allowed;
        Box::pin(async move {
            let user = match req.extensions().get::<AuthenticatedUser>() {
                Some(user) => user,
                None => return Err(ClinicError::Unauthorized.into_response()),
            };
            match RoleGate::require(user, allowed) {
                Ok(()) => Ok(req),
                Err(err) => Err(err.into_response()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(AuthMiddleware::extract_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(AuthMiddleware::extract_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
        assert_eq!(AuthMiddleware::extract_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(AuthMiddleware::extract_token(&headers), None);
    }

    fn request_as(role: Option<Role>) -> Request<Body> {
        let mut req = Request::builder().uri("/x").body(Body::empty()).unwrap();
        if let Some(role) = role {
            req.extensions_mut().insert(AuthenticatedUser {
                username: "alice".to_string(),
                full_name: None,
                role,
            });
        }
        req
    }

    #[tokio::test]
    async fn test_role_middleware() {
        let middleware = RoleMiddleware::new(&[Role::Doctor, Role::Admin]);

        assert!(middleware.before(request_as(Some(Role::Doctor))).await.is_ok());

        let denied = middleware.before(request_as(Some(Role::Nurse))).await.unwrap_err();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let anonymous = middleware.before(request_as(None)).await.unwrap_err();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    }
}
