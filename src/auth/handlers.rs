//! `/users` handlers: registration, login, current user.

use crate::auth::middleware::BearerToken;
use crate::auth::models::{CurrentUser, LoginCredentials, RegistrationData, TokenResponse, UserInfo};
use crate::auth::current_user;
use crate::context::AppContext;
use crate::errors::ClinicResult;
use crate::request::{form_or_json_body, json_body};
use crate::response::ClinicResponse;
use hyper::{Body, Request};
use std::sync::Arc;

/// POST /users/create
pub async fn register(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let data: RegistrationData = json_body(req).await?;
    let identity = ctx.auth.register(data).await?;
    Ok(ClinicResponse::created(&UserInfo::from(&identity)))
}

/// POST /users/token
pub async fn login(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let credentials: LoginCredentials = form_or_json_body(req).await?;
    let token = ctx.auth.login(credentials).await?;
    Ok(ClinicResponse::ok(&TokenResponse::bearer(token)))
}

/// GET /users/me
pub async fn me(req: Request<Body>, ctx: Arc<AppContext>) -> ClinicResult<ClinicResponse> {
    let user = current_user(&req)?;
    let token = req.extensions().get::<BearerToken>().cloned();
    let session = match token {
        Some(BearerToken(token)) => ctx.auth.sessions().get(&token).await,
        None => None,
    };

    Ok(ClinicResponse::ok(&CurrentUser {
        username: user.username,
        full_name: user.full_name,
        role: user.role,
        session,
    }))
}
