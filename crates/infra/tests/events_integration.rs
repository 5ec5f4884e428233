//! Integration tests for client event broadcasting
//!
//! **Coverage:**
//! - Backend-down fires once per outage, backend-up once per recovery, and
//!   the cycle repeats
//! - Unreachable hosts and timeouts count as outages
//! - 429 broadcasts rate-limited with `Retry-After`, never touches auth
//! - Identical api-error bursts are deduplicated
//! - Silent requests are not broadcast

#![allow(dead_code)]

mod support;

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use storefront_common::auth::MemoryStore;
use storefront_infra::api::{ApiError, EventKind};
use storefront_infra::{ApiRequest, AuthenticatedHttpClient, ClientConfig, ClientEvent};
use support::{EventLog, Harness, REFRESH_PATH};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

/// Validates idempotent backend-down flagging.
///
/// # Test Steps
/// 1. Two requests get 503 -> exactly one backend-down
/// 2. A request succeeds -> exactly one backend-up
#[tokio::test]
async fn test_backend_down_fires_once_and_recovers_once() {
    let h = Harness::start().await;

    Mock::given(path("/products"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&h.server)
        .await;
    Mock::given(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&h.server)
        .await;

    for _ in 0..2 {
        let err = h.client.get::<Value>("/products").await.unwrap_err();
        assert_eq!(err.user_message(), "Server error. Please try again later.");
    }
    assert!(h.client.is_backend_down());

    let _: Vec<Value> = h.client.get("/products").await.unwrap();
    let _: Vec<Value> = h.client.get("/products").await.unwrap();

    assert_eq!(h.events.count(EventKind::BackendDown), 1);
    assert_eq!(h.events.count(EventKind::BackendUp), 1);
    assert!(!h.client.is_backend_down());
}

/// Validates that the outage cycle repeats.
///
/// # Test Steps
/// 1. 503 -> backend-down, 200 -> backend-up
/// 2. 503 again -> a second backend-down, 200 -> a second backend-up
#[tokio::test]
async fn test_backend_outage_cycle_repeats() {
    let h = Harness::start().await;

    for _ in 0..2 {
        Mock::given(path("/products"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&h.server)
            .await;
        let _ = h.client.get::<Value>("/products").await;
        assert!(h.client.is_backend_down());

        h.server.reset().await;
        Mock::given(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&h.server)
            .await;
        let _: Vec<Value> = h.client.get("/products").await.unwrap();
        assert!(!h.client.is_backend_down());
    }

    assert_eq!(
        h.events.kinds(),
        vec![
            EventKind::BackendDown,
            EventKind::ApiError,
            EventKind::BackendUp,
            EventKind::BackendDown,
            EventKind::BackendUp,
        ]
    );
}

/// Validates that an unreachable host is an outage and that
/// `mark_backend_up` ends it.
#[tokio::test]
async fn test_connection_failure_flags_backend_down() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener); // nothing listens here any more

    let client = AuthenticatedHttpClient::new(
        ClientConfig::with_base_url(format!("http://{addr}")),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();
    let events = EventLog::attach(&client);

    let err = client.get::<Value>("/products").await.unwrap_err();
    assert!(matches!(err, ApiError::Network { .. }), "{err:?}");
    assert_eq!(err.user_message(), "Unable to reach the server. Check your internet connection.");

    let _ = client.get::<Value>("/categories").await;
    assert_eq!(events.count(EventKind::BackendDown), 1);

    assert!(client.mark_backend_up());
    assert!(!client.mark_backend_up());
    assert_eq!(events.count(EventKind::BackendUp), 1);
}

/// Validates that a request timeout is an outage and never refreshes.
#[tokio::test]
async fn test_timeout_is_network_class() {
    let h = Harness::with_config(|c| c.timeout_ms = 100).await;
    h.sign_in("T1", None);

    Mock::given(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&h.server)
        .await;

    let err = h.client.get::<Value>("/orders").await.unwrap_err();

    assert!(matches!(err, ApiError::Timeout { .. }), "{err:?}");
    assert_eq!(err.user_message(), "The server took too long to respond. Please try again.");
    assert_eq!(h.refresh_calls().await, 0);
    assert_eq!(h.events.count(EventKind::BackendDown), 1);
}

/// Validates health probe transitions.
#[tokio::test]
async fn test_health_check_recovers_backend() {
    let h = Harness::start().await;

    Mock::given(path("/orders")).respond_with(ResponseTemplate::new(502)).mount(&h.server).await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.server)
        .await;

    let _ = h.client.get::<Value>("/orders").await;
    assert!(h.client.health_check().await.unwrap());

    assert_eq!(h.events.kinds(), vec![EventKind::BackendDown, EventKind::ApiError, EventKind::BackendUp]);
}

/// Validates the rate-limited broadcast.
///
/// Assertions:
/// - Carries `Retry-After` seconds and the URL
/// - No api-error broadcast, no refresh, credentials untouched
#[tokio::test]
async fn test_rate_limited_broadcast() {
    let h = Harness::start().await;
    h.sign_in("T1", None);

    Mock::given(path("/cart"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&h.server)
        .await;
    Mock::given(path(REFRESH_PATH)).respond_with(ResponseTemplate::new(200)).expect(0).mount(&h.server).await;

    let err = h.client.get::<Value>("/cart").await.unwrap_err();

    assert_eq!(err.user_message(), "Too many requests. Please wait a moment and try again.");
    match h.events.events().as_slice() {
        [ClientEvent::RateLimited(event)] => {
            assert_eq!(event.retry_after_secs, Some(7));
            assert!(event.url.ends_with("/cart"));
        }
        other => panic!("expected one rate-limited event, got {other:?}"),
    }
    assert_eq!(h.stored("access-token").as_deref(), Some("T1"));
}

/// Validates api-error deduplication within the window.
#[tokio::test]
async fn test_identical_api_errors_are_deduplicated() {
    let h = Harness::start().await;

    Mock::given(path("/orders")).respond_with(ResponseTemplate::new(500)).mount(&h.server).await;
    Mock::given(path("/categories"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "errors": [{ "message": "Name is required" }] })))
        .mount(&h.server)
        .await;

    for _ in 0..3 {
        let _ = h.client.get::<Value>("/orders").await;
    }
    let err = h.client.post::<_, Value>("/categories", &json!({})).await.unwrap_err();
    assert_eq!(err.user_message(), "Name is required");

    let api_errors: Vec<_> = h
        .events
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::ApiError(event) => Some((event.status, event.message)),
            _ => None,
        })
        .collect();
    assert_eq!(
        api_errors,
        vec![
            (Some(500), "Server error. Please try again later.".to_string()),
            (Some(422), "Name is required".to_string()),
        ]
    );
}

/// Validates that silent requests are not broadcast.
#[tokio::test]
async fn test_silent_request_is_not_broadcast() {
    let h = Harness::start().await;

    Mock::given(path("/recommendations")).respond_with(ResponseTemplate::new(500)).mount(&h.server).await;
    Mock::given(path("/limited")).respond_with(ResponseTemplate::new(429)).mount(&h.server).await;

    let err = h.client.send(ApiRequest::get("/recommendations").silent()).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    let err = h.client.send(ApiRequest::get("/limited").silent()).await.unwrap_err();
    assert_eq!(err.status(), Some(429));

    assert!(h.events.events().is_empty(), "{:?}", h.events.kinds());
}

/// Validates unsubscribing through the client.
#[tokio::test]
async fn test_unsubscribe_through_client() {
    let h = Harness::start().await;
    Mock::given(path("/orders")).respond_with(ResponseTemplate::new(404)).mount(&h.server).await;

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let id = h.client.on_api_error(move |event| sink.lock().push(event.message.clone()));

    let _ = h.client.get::<Value>("/orders").await;
    assert!(h.client.unsubscribe(id));
    let _ = h.client.get::<Value>("/orders?page=2").await;

    assert_eq!(*seen.lock(), vec!["The requested resource was not found.".to_string()]);
}
