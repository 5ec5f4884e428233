//! Authenticated HTTP client
//!
//! Wraps a [`Transport`] with the session handling every storefront call
//! needs:
//! - bearer and device headers on the way out
//! - a single-flight token refresh and one retry when a request gets a 401
//! - error normalization and event broadcasting on terminal failures
//!
//! A refresh that succeeds is invisible to the caller; one that fails clears
//! the stored session, rejects every request waiting on it and broadcasts
//! `SessionExpired` once.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use storefront_common::auth::{
    CredentialManager, CredentialStore, MemoryStore, RefreshedTokens, TokenPolicy,
};
use storefront_common::error::ErrorClassification;
use tracing::{debug, info, instrument, warn};

use super::errors::{ApiError, NETWORK_MESSAGE, SESSION_EXPIRED_MESSAGE, TIMEOUT_MESSAGE};
use super::events::{
    ApiErrorEvent, BackendStatus, ClientEvent, EventBus, RateLimited, SessionExpired,
    SubscriptionId,
};
use super::refresh::{self, RefreshCoordinator, RefreshError, RefreshLease, RefreshTicket};
use super::request::{ApiRequest, ApiResponse, OutboundRequest};
use crate::config::ClientConfig;
use crate::http::{HttpClient, HttpRequest, Transport, TransportError};

struct ClientInner {
    config: ClientConfig,
    device_header: HeaderName,
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialManager>,
    refresh: RefreshCoordinator,
    events: EventBus,
    access_policy: TokenPolicy,
    refresh_policy: TokenPolicy,
}

/// Session-aware API client
///
/// Cheap to clone; clones share credentials, refresh state and listeners.
#[derive(Clone)]
pub struct AuthenticatedHttpClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for AuthenticatedHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedHttpClient")
            .field("base_url", &self.inner.config.base_url)
            .field("refresh", &self.inner.refresh)
            .field("events", &self.inner.events)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedHttpClient {
    /// Create a builder for fluent configuration
    pub fn builder() -> AuthenticatedHttpClientBuilder {
        AuthenticatedHttpClientBuilder::default()
    }

    /// Create a client over `store` with the default reqwest transport
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the transport cannot
    /// be created
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Self::builder().config(config).store(store).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.inner.credentials
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Whether a token refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    // Requests
    // ---------------------------------------------------------------

    /// Send a request and return the raw response
    ///
    /// # Errors
    ///
    /// Returns the normalized error for non-2xx responses, transport
    /// failures and expired sessions
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.path()))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut outbound = OutboundRequest::new(request);

        match self.execute(&mut outbound).await {
            Ok(response) => {
                let url = self.inner.config.url_for(outbound.request().path());
                self.inner.events.backend_reachable(
                    Some(response.status().as_u16()),
                    &url,
                    "Backend is reachable",
                );
                Ok(response)
            }
            Err(err) => {
                debug!(error = %err, retried = outbound.retried(), "Request failed");
                self.report_failure(outbound.request(), &err);
                Err(err)
            }
        }
    }

    /// Send a request and deserialize the JSON response
    ///
    /// Empty and 204/205 responses deserialize from `null`, so `()` and
    /// `Option<T>` work for endpoints without a body.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body does not deserialize
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let url = self.inner.config.url_for(request.path());
        let response = self.send(request).await?;
        decode_json(&url, &response)
    }

    /// Execute a GET request
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::get(path)).await
    }

    /// Execute a POST request with a JSON body
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::post(path).json(body)?).await
    }

    /// Execute a PUT request with a JSON body
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::put(path).json(body)?).await
    }

    /// Execute a PATCH request with a JSON body
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::patch(path).json(body)?).await
    }

    /// Execute a DELETE request
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::delete(path)).await
    }

    /// Probe the health endpoint
    ///
    /// Sent without credentials and never broadcast as an API error. A 2xx
    /// marks the backend reachable.
    ///
    /// # Returns
    ///
    /// `true` if the backend answered with a 2xx
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<bool, ApiError> {
        let config = &self.inner.config;
        let request = ApiRequest::get(config.health_path.clone()).skip_auth_retry().silent();
        let prepared = self.prepare(&request, None);
        let url = prepared.url.clone();

        match self.transmit(prepared).await {
            Ok(response) if response.is_success() => {
                info!("API is healthy");
                self.inner.events.backend_reachable(
                    Some(response.status().as_u16()),
                    &url,
                    "Backend is healthy",
                );
                Ok(true)
            }
            Ok(response) => {
                let status = response.status().as_u16();
                warn!(status, "API returned non-success status");
                if (502..=504).contains(&status) {
                    self.inner.events.backend_unreachable(
                        Some(status),
                        &url,
                        &ApiError::from_response(&url, &response).user_message(),
                    );
                }
                Ok(false)
            }
            Err(err) => {
                warn!(error = %err, "Health check failed");
                self.inner.events.backend_unreachable(None, &url, &err.user_message());
                Err(err)
            }
        }
    }

    /// Mark the backend reachable after an external check
    ///
    /// Returns `true` if this ended an outage.
    pub fn mark_backend_up(&self) -> bool {
        self.inner.events.backend_reachable(None, &self.inner.config.base_url, "Backend is reachable")
    }

    pub fn is_backend_down(&self) -> bool {
        self.inner.events.is_backend_down()
    }

    // Session
    // ---------------------------------------------------------------

    /// Persist the tokens returned by a login call
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` if the store rejects the write
    pub fn login_with_tokens(&self, tokens: &RefreshedTokens) -> Result<(), ApiError> {
        self.inner.credentials.store_tokens(tokens)?;
        info!(has_refresh_token = tokens.refresh_token.is_some(), "Session established");
        Ok(())
    }

    /// Extract tokens from a login or refresh response body
    pub fn extract_tokens(&self, body: &Value) -> Option<RefreshedTokens> {
        RefreshedTokens::from_body_with(body, &self.inner.access_policy, &self.inner.refresh_policy)
    }

    /// End the session; the device id is kept
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` if the store cannot be cleared
    pub fn logout(&self) -> Result<(), ApiError> {
        self.inner.credentials.clear_session()?;
        Ok(())
    }

    pub fn device_id(&self) -> String {
        self.inner.credentials.device_id()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.credentials.is_authenticated()
    }

    // Events
    // ---------------------------------------------------------------

    pub fn on_event<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.events.on_event(handler)
    }

    pub fn on_session_expired<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionExpired) + Send + Sync + 'static,
    {
        self.inner.events.on_session_expired(handler)
    }

    pub fn on_backend_down<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BackendStatus) + Send + Sync + 'static,
    {
        self.inner.events.on_backend_down(handler)
    }

    pub fn on_backend_up<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BackendStatus) + Send + Sync + 'static,
    {
        self.inner.events.on_backend_up(handler)
    }

    pub fn on_rate_limited<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&RateLimited) + Send + Sync + 'static,
    {
        self.inner.events.on_rate_limited(handler)
    }

    pub fn on_api_error<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ApiErrorEvent) + Send + Sync + 'static,
    {
        self.inner.events.on_api_error(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    // Internals
    // ---------------------------------------------------------------

    async fn execute(&self, outbound: &mut OutboundRequest) -> Result<ApiResponse, ApiError> {
        let sent_token = self.inner.credentials.access_token();
        let response = self.dispatch(outbound.request(), sent_token.as_deref()).await?;

        if !self.should_refresh(outbound, &response) {
            return self.finish(outbound.request(), response);
        }

        outbound.mark_retried();
        let token = self.fresh_token(sent_token.as_deref()).await?;

        debug!("Retrying request with refreshed token");
        let response = self.dispatch(outbound.request(), Some(&token)).await?;
        self.finish(outbound.request(), response)
    }

    fn should_refresh(&self, outbound: &OutboundRequest, response: &ApiResponse) -> bool {
        let request = outbound.request();
        response.status() == StatusCode::UNAUTHORIZED
            && !outbound.retried()
            && !request.skips_auth_retry()
            && !self.inner.config.is_auth_exempt(request.path())
    }

    fn finish(&self, request: &ApiRequest, response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.is_success() {
            return Ok(response);
        }
        let url = self.inner.config.url_for(request.path());
        Err(ApiError::from_response(&url, &response))
    }

    /// Token to retry with: the current one if `sent` is already outdated,
    /// otherwise the outcome of the (possibly shared) refresh
    async fn fresh_token(&self, sent: Option<&str>) -> Result<String, ApiError> {
        let credentials = &self.inner.credentials;
        let ticket = self.inner.refresh.begin(|| {
            credentials.access_token().filter(|current| Some(current.as_str()) != sent)
        });

        match ticket {
            RefreshTicket::Current(token) => {
                debug!("Access token already replaced, retrying without refresh");
                Ok(token)
            }
            RefreshTicket::Follower(receiver) => {
                refresh::wait_for(receiver).await.map_err(ApiError::from_refresh)
            }
            RefreshTicket::Leader(lease) => self.lead_refresh(lease).await,
        }
    }

    async fn lead_refresh(&self, lease: RefreshLease<'_>) -> Result<String, ApiError> {
        info!("Access token rejected, refreshing session");

        match self.request_refresh().await {
            Ok(tokens) => {
                if let Err(e) = self.inner.credentials.store_tokens(&tokens) {
                    // The new access token is still cached in memory, but a
                    // rotated refresh token is lost on restart.
                    warn!(error = %e, "Failed to persist refreshed tokens");
                    let err = ApiError::Storage(e);
                    let config = &self.inner.config;
                    self.inner.events.api_error(
                        err.severity(),
                        None,
                        &config.url_for(&config.refresh_path),
                        &err.user_message(),
                    );
                }
                let released = lease.settle(Ok(tokens.access_token.clone()));
                info!(released, "Session refreshed");
                Ok(tokens.access_token)
            }
            Err(err) => {
                warn!(error = %err, "Session refresh failed");
                if let Err(e) = self.inner.credentials.clear_session() {
                    warn!(error = %e, "Failed to clear credentials after refresh failure");
                }
                let released = lease.settle(Err(err.clone()));
                debug!(released, "Queued requests rejected");
                self.inner.events.session_expired(
                    &self.inner.config.session_expired_redirect,
                    SESSION_EXPIRED_MESSAGE,
                );
                Err(ApiError::SessionExpired(err))
            }
        }
    }

    async fn request_refresh(&self) -> Result<RefreshedTokens, RefreshError> {
        let config = &self.inner.config;
        let timeout = config.refresh_timeout();
        let mut request =
            HttpRequest::new(Method::POST, config.url_for(&config.refresh_path), timeout);
        let url = request.url.clone();
        self.attach_device_header(&mut request.headers);

        if let Some(refresh_token) = self.inner.credentials.refresh_token() {
            let mut body = serde_json::Map::new();
            body.insert(config.refresh_token_field.clone(), Value::String(refresh_token));
            request.body = Some(Value::Object(body));
        }

        let response =
            match tokio::time::timeout(timeout, self.inner.transport.execute(request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(TransportError::Timeout(elapsed))) => {
                    self.inner.events.backend_unreachable(None, &url, TIMEOUT_MESSAGE);
                    return Err(RefreshError::Timeout(elapsed));
                }
                Ok(Err(err)) => {
                    self.inner.events.backend_unreachable(None, &url, NETWORK_MESSAGE);
                    return Err(RefreshError::Transport(err.to_string()));
                }
                Err(_) => {
                    self.inner.events.backend_unreachable(None, &url, TIMEOUT_MESSAGE);
                    return Err(RefreshError::Timeout(timeout));
                }
            };

        if !response.is_success() {
            return Err(RefreshError::Rejected { status: response.status().as_u16() });
        }

        let body = response.json_value().ok_or(RefreshError::MissingToken)?;
        let (shape, _) = self.inner.access_policy.extract(&body).ok_or(RefreshError::MissingToken)?;
        debug!(shape, "Refresh response parsed");

        RefreshedTokens::from_body_with(&body, &self.inner.access_policy, &self.inner.refresh_policy)
            .ok_or(RefreshError::MissingToken)
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let prepared = self.prepare(request, token);
        self.transmit(prepared).await
    }

    /// Pre-send hook: resolve the URL and attach auth and device headers
    fn prepare(&self, request: &ApiRequest, token: Option<&str>) -> HttpRequest {
        let config = &self.inner.config;
        let timeout = request.timeout_override().unwrap_or_else(|| config.timeout());

        let mut prepared =
            HttpRequest::new(request.method().clone(), config.url_for(request.path()), timeout);
        prepared.headers = request.headers().clone();
        prepared.query = request.query_pairs().to_vec();
        prepared.body = request.body().cloned();

        if let Some(token) = token.filter(|_| !config.is_refresh_path(request.path())) {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    prepared.headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Access token is not a valid header value, sending without it"),
            }
        }
        self.attach_device_header(&mut prepared.headers);

        prepared
    }

    fn attach_device_header(&self, headers: &mut HeaderMap) {
        let device_id = self.inner.credentials.device_id();
        match HeaderValue::from_str(&device_id) {
            Ok(value) => {
                headers.insert(self.inner.device_header.clone(), value);
            }
            Err(_) => warn!("Device id is not a valid header value, sending without it"),
        }
    }

    async fn transmit(&self, request: HttpRequest) -> Result<ApiResponse, ApiError> {
        let url = request.url.clone();
        let timeout = request.timeout;

        debug!(url = %url, method = %request.method, "Sending request");
        match tokio::time::timeout(timeout, self.inner.transport.execute(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(ApiError::from_transport(&url, err)),
            Err(_) => Err(ApiError::Timeout { url, timeout }),
        }
    }

    /// Broadcast a terminal failure
    fn report_failure(&self, request: &ApiRequest, err: &ApiError) {
        let config = &self.inner.config;
        let events = &self.inner.events;
        let url = err.url().map_or_else(|| config.url_for(request.path()), str::to_string);

        if err.is_backend_unreachable() {
            events.backend_unreachable(err.status(), &url, &err.user_message());
        }

        if request.is_silent()
            || err.is_session_expired()
            || matches!(err, ApiError::RefreshInterrupted)
        {
            return;
        }

        match err.status() {
            Some(429) => {
                events.rate_limited(err.retry_after().map(|d| d.as_secs()), &url);
            }
            Some(401 | 403) if config.is_auth_exempt(request.path()) => {}
            status => {
                events.api_error(err.severity(), status, &url, &err.user_message());
            }
        }
    }
}

fn decode_json<T: DeserializeOwned>(url: &str, response: &ApiResponse) -> Result<T, ApiError> {
    let status = response.status();
    if response.body.is_empty()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::RESET_CONTENT
    {
        return serde_json::from_value(Value::Null).map_err(|_| ApiError::Decode {
            url: url.to_string(),
            message: format!(
                "No content response ({}), but response type cannot be deserialized from empty body",
                status.as_u16()
            ),
        });
    }

    response
        .json()
        .map_err(|e| ApiError::Decode { url: url.to_string(), message: e.to_string() })
}

/// Builder for [`AuthenticatedHttpClient`]
#[derive(Default)]
pub struct AuthenticatedHttpClientBuilder {
    config: Option<ClientConfig>,
    store: Option<Arc<dyn CredentialStore>>,
    transport: Option<Arc<dyn Transport>>,
    access_policy: Option<TokenPolicy>,
}

impl AuthenticatedHttpClientBuilder {
    /// Set the client configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the credential store (defaults to an in-memory store)
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Override the access token shapes accepted from the refresh endpoint
    pub fn access_token_policy(mut self, policy: TokenPolicy) -> Self {
        self.access_policy = Some(policy);
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the transport cannot
    /// be created
    pub fn build(self) -> Result<AuthenticatedHttpClient, ApiError> {
        let config = self.config.unwrap_or_default();
        config.validate().map_err(|e| ApiError::Config(e.to_string()))?;

        let device_header = HeaderName::from_bytes(config.device_header.as_bytes())
            .map_err(|e| ApiError::Config(format!("Invalid device header: {e}")))?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                HttpClient::builder()
                    .timeout(config.timeout().max(config.refresh_timeout()))
                    .build()
                    .map_err(|e| ApiError::Config(format!("Failed to build HttpClient: {e}")))?,
            ),
        };

        let store = self.store.unwrap_or_else(|| {
            debug!("No credential store configured, credentials kept in memory");
            Arc::new(MemoryStore::new())
        });
        let credentials = Arc::new(CredentialManager::new(store, config.storage_keys.clone()));
        let events = EventBus::new(config.event_dedup_window());

        Ok(AuthenticatedHttpClient {
            inner: Arc::new(ClientInner {
                config,
                device_header,
                transport,
                credentials,
                refresh: RefreshCoordinator::new(),
                events,
                access_policy: self.access_policy.unwrap_or_else(TokenPolicy::access_token),
                refresh_policy: TokenPolicy::refresh_token(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use storefront_common::auth::StoreError;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
    struct TestResponse {
        message: String,
    }

    #[derive(Debug, serde::Serialize)]
    struct TestRequest {
        data: String,
    }

    fn client_for(server: &MockServer) -> (AuthenticatedHttpClient, MemoryStore) {
        let store = MemoryStore::new();
        let client = AuthenticatedHttpClient::new(
            ClientConfig::with_base_url(server.uri()),
            Arc::new(store.clone()),
        )
        .unwrap();
        (client, store)
    }

    #[tokio::test]
    async fn test_health_check_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let (client, _) = client_for(&mock_server);
        assert!(client.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_health_check_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let (client, _) = client_for(&mock_server);
        let result = client.health_check().await;
        assert!(!result.unwrap()); // Unhealthy but no error
        assert!(client.is_backend_down());
    }

    #[tokio::test]
    async fn test_builder_pattern() {
        let client = AuthenticatedHttpClient::builder().build();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_builder_rejects_invalid_config() {
        let config = ClientConfig { refresh_path: "refresh".into(), ..Default::default() };
        let result = AuthenticatedHttpClient::builder().config(config).build();
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[tokio::test]
    async fn test_get_attaches_bearer_and_device_headers() {
        let mock_server = MockServer::start().await;
        let (client, store) = client_for(&mock_server);
        store.set("access-token", "T1").unwrap();
        let device_id = client.device_id();

        Mock::given(method("GET"))
            .and(path("/test"))
            .and(header("Authorization", "Bearer T1"))
            .and(header("X-Device-Id", device_id.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(TestResponse { message: "success".to_string() }),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let result: TestResponse = client.get("/test").await.unwrap();
        assert_eq!(result.message, "success");
    }

    #[tokio::test]
    async fn test_anonymous_request_sends_device_header_only() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog"))
            .and(header_exists("X-Device-Id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        let (client, _) = client_for(&mock_server);
        let items: Vec<Value> = client.get("/catalog").await.unwrap();
        assert!(items.is_empty());

        let requests = mock_server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_post_with_json_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(wiremock::matchers::body_json(serde_json::json!({ "data": "cart-1" })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(TestResponse { message: "created".to_string() }),
            )
            .mount(&mock_server)
            .await;

        let (client, _) = client_for(&mock_server);
        let result: TestResponse =
            client.post("/orders", &TestRequest { data: "cart-1".to_string() }).await.unwrap();
        assert_eq!(result.message, "created");
    }

    #[tokio::test]
    async fn test_no_content_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/cart/items/1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let (client, _) = client_for(&mock_server);
        let _: () = client.delete("/cart/items/1").await.unwrap();

        let typed: Result<TestResponse, _> = client.delete("/cart/items/1").await;
        assert!(matches!(typed, Err(ApiError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_status_error_carries_backend_message() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/9"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({ "message": "No such order" })),
            )
            .mount(&mock_server)
            .await;

        let (client, _) = client_for(&mock_server);
        let err = client.get::<Value>("/orders/9").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.user_message(), "No such order");
    }

    #[tokio::test]
    async fn test_session_helpers() {
        let mock_server = MockServer::start().await;
        let (client, store) = client_for(&mock_server);
        let device_id = client.device_id();

        let tokens = client
            .extract_tokens(&serde_json::json!({ "data": { "token": "T1", "refreshToken": "R1" } }))
            .unwrap();
        client.login_with_tokens(&tokens).unwrap();
        assert!(client.is_authenticated());
        assert_eq!(store.get("refresh-token").unwrap().as_deref(), Some("R1"));

        client.logout().unwrap();
        assert!(!client.is_authenticated());
        assert_eq!(client.device_id(), device_id);
    }

    /// Store that starts rejecting writes once `reject_writes` is set.
    #[derive(Clone, Default)]
    struct WriteLockedStore {
        inner: MemoryStore,
        reject_writes: Arc<std::sync::atomic::AtomicBool>,
    }

    impl CredentialStore for WriteLockedStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if self.reject_writes.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::AccessFailed("read-only".to_string()));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn test_unpersisted_refresh_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(path("/orders"))
            .and(header("Authorization", "Bearer T2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;
        Mock::given(path("/orders"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;
        Mock::given(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "accessToken": "T2", "refreshToken": "R2" })),
            )
            .mount(&mock_server)
            .await;

        let store = WriteLockedStore::default();
        let client = AuthenticatedHttpClient::new(
            ClientConfig::with_base_url(mock_server.uri()),
            Arc::new(store.clone()),
        )
        .unwrap();
        client
            .login_with_tokens(&RefreshedTokens {
                access_token: "T1".to_string(),
                refresh_token: Some("R1".to_string()),
            })
            .unwrap();
        client.device_id();
        store.reject_writes.store(true, std::sync::atomic::Ordering::SeqCst);

        let reported = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = reported.clone();
        client.on_api_error(move |event| sink.lock().push((event.status, event.url.clone())));

        let orders: Vec<serde_json::Value> = client.get("/orders").await.unwrap();
        assert!(orders.is_empty());

        assert_eq!(client.credentials().access_token().as_deref(), Some("T2"));
        assert_eq!(store.inner.get("refresh-token").unwrap().as_deref(), Some("R1"));
        let reported = reported.lock();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].0, None);
        assert!(reported[0].1.ends_with("/auth/refresh"));
    }
}
