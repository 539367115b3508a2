//! Handler output.
//!
//! Handlers return a `ClinicResponse`; the router turns it into a hyper response.

use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;

pub struct ClinicResponse {
    status: StatusCode,
    body: Body,
    headers: HeaderMap,
}

impl ClinicResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            body: Body::empty(),
            headers: HeaderMap::new(),
        }
    }

    /// 200 with a JSON body.
    pub fn ok<T: Serialize>(data: &T) -> Self {
        Self::new(StatusCode::OK).json(data)
    }

    /// 201 with a JSON body.
    pub fn created<T: Serialize>(data: &T) -> Self {
        Self::new(StatusCode::CREATED).json(data)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Serialize `data` as the body. A value that cannot be encoded turns
    /// the response into a 500.
    pub fn json<T: Serialize>(mut self, data: &T) -> Self {
        match serde_json::to_vec(data) {
            Ok(bytes) => {
                self.headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                self.body = Body::from(bytes);
            }
            Err(err) => {
                tracing::error!(error = %err, "response body not serializable");
                self.status = StatusCode::INTERNAL_SERVER_ERROR;
                self.body = Body::from(r#"{"detail":"Internal server error"}"#);
            }
        }
        self
    }

    /// Set a header, replacing any earlier value. Invalid names or values
    /// are dropped with an error log.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::error!(header = key, "invalid response header dropped"),
        }
        self
    }
}

impl From<ClinicResponse> for Response<Body> {
    fn from(resp: ClinicResponse) -> Self {
        let mut out = Response::new(resp.body);
        *out.status_mut() = resp.status;
        *out.headers_mut() = resp.headers;
        out
    }
}
