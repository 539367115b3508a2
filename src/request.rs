//! Request module - Helpers over hyper's Request.
//!
//! Body decoding (JSON or url-encoded form), query strings and the path
//! parameters the router captured.

use crate::errors::{ClinicError, ClinicResult};
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Request};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::str::FromStr;

/// Path parameters captured by the router, e.g. `{id}` in `/patients/{id}`.
#[derive(Debug, Clone, Default)]
pub struct PathParams(pub HashMap<String, String>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Read and parse a path parameter. Missing or malformed values are a 404,
/// the route does not exist for them.
pub fn path_param<T: FromStr>(req: &Request<Body>, name: &str) -> ClinicResult<T> {
    req.extensions()
        .get::<PathParams>()
        .and_then(|params| params.get(name))
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| ClinicError::NotFound("Resource".to_string()))
}

/// Decoded query string pairs.
pub fn query_params(req: &Request<Body>) -> HashMap<String, String> {
    req.uri()
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Parse an optional query parameter.
pub fn query_param<T: FromStr>(
    params: &HashMap<String, String>,
    name: &str,
) -> ClinicResult<Option<T>> {
    match params.get(name) {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ClinicError::BadRequest(format!("Invalid value for '{}'", name))),
    }
}

/// Page number from `?page=`, defaulting to 1. Zero and negatives are rejected.
pub fn page_param(params: &HashMap<String, String>) -> ClinicResult<u32> {
    let page: i64 = query_param(params, "page")?.unwrap_or(1);
    if page < 1 {
        return Err(ClinicError::BadRequest("page must be >= 1".to_string()));
    }
    u32::try_from(page).map_err(|_| ClinicError::BadRequest("page out of range".to_string()))
}

fn is_form(req: &Request<Body>) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Deserialize a JSON body.
pub async fn json_body<T: DeserializeOwned>(req: Request<Body>) -> ClinicResult<T> {
    let bytes = hyper::body::to_bytes(req.into_body()).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Deserialize a url-encoded form body, or JSON when the content type says so.
pub async fn form_or_json_body<T: DeserializeOwned>(req: Request<Body>) -> ClinicResult<T> {
    let form = is_form(&req);
    let bytes = hyper::body::to_bytes(req.into_body()).await?;
    if form {
        let pairs: serde_json::Map<String, serde_json::Value> =
            url::form_urlencoded::parse(&bytes)
                .into_owned()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect();
        serde_json::from_value(serde_json::Value::Object(pairs))
            .map_err(|e| ClinicError::BadRequest(format!("Invalid form: {}", e)))
    } else {
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Login {
        username: String,
        password: String,
    }

    #[tokio::test]
    async fn test_form_body() {
        let req = Request::builder()
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("username=alice&password=s%26cret"))
            .unwrap();
        let login: Login = form_or_json_body(req).await.unwrap();
        assert_eq!(login.username, "alice");
        assert_eq!(login.password, "s&cret");
    }

    #[tokio::test]
    async fn test_json_fallback() {
        let req = Request::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"username":"bob","password":"pw"}"#))
            .unwrap();
        let login: Login = form_or_json_body(req).await.unwrap();
        assert_eq!(login.username, "bob");
    }

    #[tokio::test]
    async fn test_missing_form_field_is_bad_request() {
        let req = Request::builder()
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("username=alice"))
            .unwrap();
        let err = form_or_json_body::<Login>(req).await.err().unwrap();
        assert!(matches!(err, ClinicError::BadRequest(_)));
    }

    #[test]
    fn test_query_and_page() {
        let req = Request::builder()
            .uri("/patients?page=2&q=Jo%20hn")
            .body(Body::empty())
            .unwrap();
        let params = query_params(&req);
        assert_eq!(params.get("q").unwrap(), "Jo hn");
        assert_eq!(page_param(&params).unwrap(), 2);

        let mut params = HashMap::new();
        assert_eq!(page_param(&params).unwrap(), 1);
        params.insert("page".to_string(), "0".to_string());
        assert!(page_param(&params).is_err());
        params.insert("page".to_string(), "abc".to_string());
        assert!(page_param(&params).is_err());
    }

    #[test]
    fn test_path_param() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        let mut params = HashMap::new();
        params.insert("id".to_string(), "42".to_string());
        req.extensions_mut().insert(PathParams(params));
        let id: i64 = path_param(&req, "id").unwrap();
        assert_eq!(id, 42);
        assert!(path_param::<i64>(&req, "other").is_err());
    }
}
