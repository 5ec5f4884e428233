use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, RETRY_AFTER};
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// A fully resolved HTTP call, ready to hit the wire.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            timeout,
        }
    }
}

/// A buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `Retry-After` in delta-seconds form; HTTP-date values are ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header(&RETRY_AFTER)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as JSON, `None` when empty or not JSON.
    pub fn json_value(&self) -> Option<serde_json::Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }
}

/// Failures below the HTTP status level.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("http request failed: {0}")]
    Request(String),
}

impl TransportError {
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return Self::Timeout(timeout);
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            if err.is_connect() {
                return Self::Connect(err.to_string());
            }
        }
        Self::Request(err.to_string())
    }
}

/// The wire seam the authenticated client sits on.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport with per-request timeouts and a cookie store.
///
/// Every call hits the wire exactly once.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }

    fn to_reqwest(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .timeout(request.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = &request.method;
        let url = &request.url;
        debug!(%method, %url, "sending HTTP request");

        let response = self.to_reqwest(&request).send().await.map_err(|e| {
            let err = TransportError::from_reqwest(e, request.timeout);
            debug!(%method, %url, error = %err, "HTTP request failed");
            err
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(e, request.timeout))?;

        debug!(%method, %url, %status, "received HTTP response");
        Ok(HttpResponse { status, headers, body: body.to_vec() })
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_millis(15_000) }
    }
}

impl HttpClientBuilder {
    /// Client-wide ceiling; each request also carries its own timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client. Cookies set by the backend (e.g. an HTTP-only
    /// refresh cookie) are kept for later requests.
    pub fn build(self) -> Result<HttpClient, TransportError> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .cookie_store(true)
            .no_proxy()
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(HttpClient { client })
    }
}
