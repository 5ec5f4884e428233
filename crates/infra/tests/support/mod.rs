use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use storefront_common::auth::{CredentialStore, MemoryStore, RefreshedTokens};
use storefront_infra::api::{ClientEvent, EventKind};
use storefront_infra::{AuthenticatedHttpClient, ClientConfig};
use wiremock::MockServer;

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Every event a client broadcast, in order.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ClientEvent>>>,
}

impl EventLog {
    pub fn attach(client: &AuthenticatedHttpClient) -> Self {
        let log = Self::default();
        let sink = log.events.clone();
        client.on_event(move |event| sink.lock().push(event.clone()));
        log
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(ClientEvent::kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }
}

/// A client wired to a fresh mock backend.
pub struct Harness {
    pub server: MockServer,
    pub client: AuthenticatedHttpClient,
    pub store: MemoryStore,
    pub events: EventLog,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut ClientConfig)) -> Self {
        let server = MockServer::start().await;
        let mut config = ClientConfig::with_base_url(server.uri());
        config.timeout_ms = 2_000;
        config.refresh_timeout_ms = 2_000;
        customize(&mut config);

        let store = MemoryStore::new();
        let client = AuthenticatedHttpClient::new(config, Arc::new(store.clone()))
            .expect("client should build");
        let events = EventLog::attach(&client);

        Self { server, client, store, events }
    }

    /// Store a session as if a login had just succeeded.
    pub fn sign_in(&self, access_token: &str, refresh_token: Option<&str>) {
        self.client
            .login_with_tokens(&RefreshedTokens {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.map(str::to_string),
            })
            .expect("tokens should be stored");
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.store.get(key).expect("memory store read")
    }

    /// Requests received for `path`, oldest first.
    pub async fn requests_to(&self, path: &str) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == path)
            .collect()
    }

    pub async fn refresh_calls(&self) -> usize {
        self.requests_to(REFRESH_PATH).await.len()
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub fn bearer(request: &wiremock::Request) -> Option<String> {
    request.headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_string)
}
