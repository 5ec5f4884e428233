//! Authenticated storefront API client
//!
//! # Architecture
//!
//! - [`client`]: interceptors, refresh-and-retry, verb helpers, health probe
//! - [`refresh`]: single-flight refresh state machine and waiter queue
//! - [`events`]: observer registry for session, backend and error events
//! - [`errors`]: normalized errors and user-facing messages
//! - [`request`]: request builder with per-call opt-outs
//!
//! All wire traffic goes through [`crate::http::Transport`].

pub mod client;
pub mod errors;
pub mod events;
pub mod refresh;
pub mod request;

pub use client::{AuthenticatedHttpClient, AuthenticatedHttpClientBuilder};
pub use errors::{ApiError, ApiErrorCategory};
pub use events::{
    ApiErrorEvent, BackendStatus, ClientEvent, EventBus, EventKind, RateLimited, SessionExpired,
    SubscriptionId,
};
pub use refresh::{RefreshCoordinator, RefreshError};
pub use request::{ApiRequest, ApiResponse};
