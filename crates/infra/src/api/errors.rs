//! API-specific error types
//!
//! Every terminal failure of the authenticated client is normalized into an
//! [`ApiError`] carrying a user-facing message, a category and retry
//! metadata.

use std::time::Duration;

use serde_json::Value;
use storefront_common::auth::StoreError;
use storefront_common::error::{ErrorClassification, ErrorSeverity};
use thiserror::Error;

use super::refresh::RefreshError;
use crate::http::{HttpResponse, TransportError};

pub const TIMEOUT_MESSAGE: &str = "The server took too long to respond. Please try again.";
pub const NETWORK_MESSAGE: &str = "Unable to reach the server. Check your internet connection.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";
pub const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

/// JSON pointers probed, in order, for a backend-supplied error message
const BACKEND_MESSAGE_POINTERS: &[&str] =
    &["/message", "/error", "/detail", "/data/message", "/errors/0/message"];

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authentication errors (401, 403, expired session)
    Authentication,
    /// Rate limiting errors (429) - retry with backoff
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth, bad payloads) - non-retryable
    Client,
    /// Network/connection errors and timeouts - retryable
    Network,
    /// Configuration and storage errors - non-retryable
    Config,
}

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("{url} returned status {status}")]
    Status {
        status: u16,
        url: String,
        /// Message supplied by the backend in the response body
        message: Option<String>,
        retry_after: Option<Duration>,
    },

    #[error("Session expired: {0}")]
    SessionExpired(#[source] RefreshError),

    /// The refresh this request waited on stopped before settling; the
    /// stored session is untouched.
    #[error("Session refresh was interrupted before completing")]
    RefreshInterrupted,

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Failed to encode request body: {0}")]
    Encode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ApiError {
    /// Map a transport failure for `url`
    pub fn from_transport(url: &str, err: TransportError) -> Self {
        match err {
            TransportError::Timeout(timeout) => Self::Timeout { url: url.to_string(), timeout },
            TransportError::Connect(message) | TransportError::Request(message) => {
                Self::Network { url: url.to_string(), message }
            }
        }
    }

    /// Map the outcome of a failed refresh
    pub fn from_refresh(err: RefreshError) -> Self {
        match err {
            RefreshError::Abandoned => Self::RefreshInterrupted,
            other => Self::SessionExpired(other),
        }
    }

    /// Map a non-success response for `url`
    pub fn from_response(url: &str, response: &HttpResponse) -> Self {
        Self::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
            message: response.json_value().as_ref().and_then(backend_message),
            retry_after: response.retry_after(),
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Timeout { .. } | Self::Network { .. } | Self::RefreshInterrupted => {
                ApiErrorCategory::Network
            }
            Self::Status { status, .. } => match *status {
                401 | 403 => ApiErrorCategory::Authentication,
                429 => ApiErrorCategory::RateLimit,
                s if s >= 500 => ApiErrorCategory::Server,
                _ => ApiErrorCategory::Client,
            },
            Self::SessionExpired(_) => ApiErrorCategory::Authentication,
            Self::Decode { .. } | Self::Encode(_) => ApiErrorCategory::Client,
            Self::Config(_) | Self::Storage(_) => ApiErrorCategory::Config,
        }
    }

    /// HTTP status, when the failure came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Target URL, when known
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Timeout { url, .. }
            | Self::Network { url, .. }
            | Self::Status { url, .. }
            | Self::Decode { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Whether the failure suggests the backend cannot be reached
    ///
    /// True for transport failures, timeouts and 502/503/504.
    pub fn is_backend_unreachable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Status { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }

    /// Message suitable for showing to an end user
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout { .. } => TIMEOUT_MESSAGE.to_string(),
            Self::Network { .. } => NETWORK_MESSAGE.to_string(),
            Self::SessionExpired(_) => SESSION_EXPIRED_MESSAGE.to_string(),
            Self::Status { status, message, .. } => status_message(*status, message.as_deref()),
            Self::RefreshInterrupted
            | Self::Decode { .. }
            | Self::Encode(_)
            | Self::Config(_)
            | Self::Storage(_) => GENERIC_MESSAGE.to_string(),
        }
    }
}

fn status_message(status: u16, backend: Option<&str>) -> String {
    let fixed = match status {
        403 => Some("You do not have permission to perform this action."),
        429 => Some("Too many requests. Please wait a moment and try again."),
        s if s >= 500 => Some("Server error. Please try again later."),
        _ => None,
    };
    if let Some(fixed) = fixed {
        return fixed.to_string();
    }

    let fallback = match status {
        400 => "The request could not be processed.",
        401 => SESSION_EXPIRED_MESSAGE,
        404 => "The requested resource was not found.",
        409 => "The request conflicts with the current state of the resource.",
        422 => "Some of the submitted data is invalid.",
        _ => GENERIC_MESSAGE,
    };
    backend.unwrap_or(fallback).to_string()
}

/// First non-empty string found at [`BACKEND_MESSAGE_POINTERS`]
pub fn backend_message(body: &Value) -> Option<String> {
    BACKEND_MESSAGE_POINTERS.iter().find_map(|pointer| {
        body.pointer(pointer)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } | Self::RefreshInterrupted => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } | Self::SessionExpired(_) | Self::RefreshInterrupted => {
                ErrorSeverity::Warning
            }
            Self::Network { .. } => ErrorSeverity::Error,
            Self::Status { status, .. } => match *status {
                401 | 403 | 429 => ErrorSeverity::Warning,
                s if s >= 500 => ErrorSeverity::Error,
                _ => ErrorSeverity::Info,
            },
            Self::Decode { .. } | Self::Encode(_) | Self::Config(_) => ErrorSeverity::Error,
            Self::Storage(e) => e.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_critical(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
