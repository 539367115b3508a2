//! Error taxonomy shared by handlers and middleware.
//!
//! Every variant maps to exactly one HTTP status. Authentication failures are
//! deliberately coarse here: the precise reason lives in `auth::AuthError` and
//! only ever reaches the logs.

use hyper::{Body, Response, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Could not validate credentials")]
    Unauthorized,

    #[error("Incorrect credentials")]
    InvalidCredentials,

    #[error("Operation not permitted")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Username exists")]
    DuplicateUsername,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type ClinicResult<T> = Result<T, ClinicError>;

impl ClinicError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ClinicError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ClinicError::Unauthorized | ClinicError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ClinicError::Forbidden => StatusCode::FORBIDDEN,
            ClinicError::NotFound(_) => StatusCode::NOT_FOUND,
            ClinicError::DuplicateUsername => StatusCode::CONFLICT,
            ClinicError::Database(_) | ClinicError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed to clients. Server-side failures never leak their cause.
    pub fn detail(&self) -> String {
        match self {
            ClinicError::Database(_) | ClinicError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Render as a JSON `{"detail": ...}` response.
    pub fn into_response(self) -> Response<Body> {
        if let ClinicError::Database(ref cause) | ClinicError::Internal(ref cause) = self {
            tracing::error!(error = %cause, "request failed");
        }
        let status = self.status_code();
        let body = serde_json::json!({ "detail": self.detail() }).to_string();
        let mut builder = Response::builder()
            .status(status)
            .header("content-type", "application/json");
        if matches!(self, ClinicError::Unauthorized) {
            builder = builder.header("www-authenticate", "Bearer");
        }
        builder
            .body(Body::from(body))
            .unwrap_or_else(|_| Response::new(Body::from("Internal server error")))
    }
}

impl From<tokio_rusqlite::Error> for ClinicError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        ClinicError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for ClinicError {
    fn from(err: serde_json::Error) -> Self {
        ClinicError::BadRequest(format!("Invalid JSON: {}", err))
    }
}

impl From<hyper::Error> for ClinicError {
    fn from(err: hyper::Error) -> Self {
        ClinicError::BadRequest(format!("Failed to read body: {}", err))
    }
}
