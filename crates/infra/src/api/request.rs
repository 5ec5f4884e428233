//! Request model for the authenticated client

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;

use super::errors::ApiError;

/// Responses are returned buffered
pub use crate::http::HttpResponse as ApiResponse;

/// A request relative to the configured base URL
///
/// # Examples
///
/// ```
/// use storefront_infra::api::ApiRequest;
///
/// let request = ApiRequest::get("/orders")
///     .query("page", "2")
///     .silent();
/// assert_eq!(request.path(), "/orders");
/// assert!(request.is_silent());
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
    timeout: Option<Duration>,
    silent: bool,
    skip_auth_retry: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            silent: false,
            skip_auth_retry: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON payload
    ///
    /// # Errors
    /// Returns `ApiError::Encode` if `body` cannot be serialized.
    pub fn json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        Ok(self.json_value(value))
    }

    /// Override the configured request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Do not broadcast this request's failures
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Return 401s as-is instead of refreshing the session
    pub fn skip_auth_retry(mut self) -> Self {
        self.skip_auth_retry = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn skips_auth_retry(&self) -> bool {
        self.skip_auth_retry
    }
}

/// A request in flight, with its single-retry marker
#[derive(Debug)]
pub(crate) struct OutboundRequest {
    request: ApiRequest,
    retried: bool,
}

impl OutboundRequest {
    pub(crate) fn new(request: ApiRequest) -> Self {
        Self { request, retried: false }
    }

    pub(crate) fn request(&self) -> &ApiRequest {
        &self.request
    }

    pub(crate) fn retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }
}
