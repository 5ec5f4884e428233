//! Client event bus
//!
//! UI layers subscribe to what the client observes on the wire: session
//! expiry, backend reachability, rate limiting and generic API failures.
//!
//! - Handlers run synchronously on the task that produced the event and are
//!   called outside the registry lock, so a handler may subscribe or
//!   unsubscribe.
//! - Backend reachability is edge-triggered: `BackendDown` fires once per
//!   outage and `BackendUp` once per recovery.
//! - Identical `RateLimited` and `ApiError` events within the dedup window
//!   are dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use parking_lot::RwLock;
use storefront_common::error::ErrorSeverity;
use tracing::{debug, info, warn};

/// Session could not be refreshed; the user must sign in again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionExpired {
    /// Where the UI should navigate
    pub redirect: String,
    pub message: String,
}

/// Backend reachability transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub status: Option<u16>,
    pub url: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after_secs: Option<u64>,
    pub url: String,
}

/// Terminal request failure worth surfacing globally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorEvent {
    pub severity: ErrorSeverity,
    pub status: Option<u16>,
    pub url: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    SessionExpired(SessionExpired),
    BackendDown(BackendStatus),
    BackendUp(BackendStatus),
    RateLimited(RateLimited),
    ApiError(ApiErrorEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionExpired,
    BackendDown,
    BackendUp,
    RateLimited,
    ApiError,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionExpired => "session-expired",
            Self::BackendDown => "backend-down",
            Self::BackendUp => "backend-up",
            Self::RateLimited => "rate-limited",
            Self::ApiError => "api-error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SessionExpired(_) => EventKind::SessionExpired,
            Self::BackendDown(_) => EventKind::BackendDown,
            Self::BackendUp(_) => EventKind::BackendUp,
            Self::RateLimited(_) => EventKind::RateLimited,
            Self::ApiError(_) => EventKind::ApiError,
        }
    }
}

/// Handle returned by every `on_*` registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

struct Listener {
    id: SubscriptionId,
    kind: Option<EventKind>,
    handler: Handler,
}

/// Observer registry owned by one client
pub struct EventBus {
    listeners: RwLock<Vec<Listener>>,
    next_id: AtomicU64,
    backend_down: AtomicBool,
    recent: Cache<String, ()>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.read().len())
            .field("backend_down", &self.is_backend_down())
            .finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Duration::from_millis(3_000))
    }
}

impl EventBus {
    /// Create a bus dropping duplicate events seen within `dedup_window`
    pub fn new(dedup_window: Duration) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            backend_down: AtomicBool::new(false),
            recent: Cache::builder().max_capacity(1_024).time_to_live(dedup_window).build(),
        }
    }

    // Registration
    // ---------------------------------------------------------------

    /// Receive every event
    pub fn on_event<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler))
    }

    pub fn on_session_expired<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionExpired) + Send + Sync + 'static,
    {
        self.register(
            Some(EventKind::SessionExpired),
            Arc::new(move |event| {
                if let ClientEvent::SessionExpired(payload) = event {
                    handler(payload);
                }
            }),
        )
    }

    pub fn on_backend_down<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BackendStatus) + Send + Sync + 'static,
    {
        self.register(
            Some(EventKind::BackendDown),
            Arc::new(move |event| {
                if let ClientEvent::BackendDown(payload) = event {
                    handler(payload);
                }
            }),
        )
    }

    pub fn on_backend_up<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BackendStatus) + Send + Sync + 'static,
    {
        self.register(
            Some(EventKind::BackendUp),
            Arc::new(move |event| {
                if let ClientEvent::BackendUp(payload) = event {
                    handler(payload);
                }
            }),
        )
    }

    pub fn on_rate_limited<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&RateLimited) + Send + Sync + 'static,
    {
        self.register(
            Some(EventKind::RateLimited),
            Arc::new(move |event| {
                if let ClientEvent::RateLimited(payload) = event {
                    handler(payload);
                }
            }),
        )
    }

    pub fn on_api_error<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ApiErrorEvent) + Send + Sync + 'static,
    {
        self.register(
            Some(EventKind::ApiError),
            Arc::new(move |event| {
                if let ClientEvent::ApiError(payload) = event {
                    handler(payload);
                }
            }),
        )
    }

    /// Remove a handler; returns `false` if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn register(&self, kind: Option<EventKind>, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(Listener { id, kind, handler });
        id
    }

    // Broadcasting
    // ---------------------------------------------------------------

    /// Deliver `event` to matching handlers
    pub fn emit(&self, event: &ClientEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .listeners
            .read()
            .iter()
            .filter(|l| l.kind.map_or(true, |k| k == kind))
            .map(|l| Arc::clone(&l.handler))
            .collect();

        debug!(event = %kind, handlers = handlers.len(), "Broadcasting client event");
        for handler in handlers {
            handler(event);
        }
    }

    pub fn session_expired(&self, redirect: &str, message: &str) {
        warn!(redirect = %redirect, "Session expired");
        self.emit(&ClientEvent::SessionExpired(SessionExpired {
            redirect: redirect.to_string(),
            message: message.to_string(),
        }));
    }

    /// Record an unreachable backend; fires `BackendDown` only on the
    /// up-to-down transition
    pub fn backend_unreachable(&self, status: Option<u16>, url: &str, message: &str) -> bool {
        if self.backend_down.swap(true, Ordering::AcqRel) {
            return false;
        }
        warn!(status = ?status, url = %url, "Backend unreachable");
        self.emit(&ClientEvent::BackendDown(BackendStatus {
            status,
            url: url.to_string(),
            message: message.to_string(),
        }));
        true
    }

    /// Record a reachable backend; fires `BackendUp` only on the
    /// down-to-up transition
    pub fn backend_reachable(&self, status: Option<u16>, url: &str, message: &str) -> bool {
        if !self.backend_down.swap(false, Ordering::AcqRel) {
            return false;
        }
        info!(status = ?status, url = %url, "Backend reachable again");
        self.emit(&ClientEvent::BackendUp(BackendStatus {
            status,
            url: url.to_string(),
            message: message.to_string(),
        }));
        true
    }

    pub fn is_backend_down(&self) -> bool {
        self.backend_down.load(Ordering::Acquire)
    }

    /// Returns `false` when suppressed as a duplicate
    pub fn rate_limited(&self, retry_after_secs: Option<u64>, url: &str) -> bool {
        if !self.first_in_window(EventKind::RateLimited, Some(429), url) {
            return false;
        }
        self.emit(&ClientEvent::RateLimited(RateLimited {
            retry_after_secs,
            url: url.to_string(),
        }));
        true
    }

    /// Returns `false` when suppressed as a duplicate
    pub fn api_error(
        &self,
        severity: ErrorSeverity,
        status: Option<u16>,
        url: &str,
        message: &str,
    ) -> bool {
        if !self.first_in_window(EventKind::ApiError, status, url) {
            return false;
        }
        self.emit(&ClientEvent::ApiError(ApiErrorEvent {
            severity,
            status,
            url: url.to_string(),
            message: message.to_string(),
        }));
        true
    }

    fn first_in_window(&self, kind: EventKind, status: Option<u16>, url: &str) -> bool {
        let key = format!("{kind}|{}|{url}", status.map(|s| s.to_string()).unwrap_or_default());
        let fresh = self.recent.entry(key).or_insert(()).is_fresh();
        if !fresh {
            debug!(event = %kind, url = %url, "Duplicate event suppressed");
        }
        fresh
    }
}
