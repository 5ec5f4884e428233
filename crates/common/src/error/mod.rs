//! Common error types and utilities shared by the storefront crates
//!
//! This module provides the error vocabulary every layer builds on:
//!
//! 1. **`CommonError`**: standard failure patterns that appear in more than one
//!    crate (configuration, serialization and persistence failures).
//!
//! 2. **`ErrorClassification` trait**: a standard interface for classifying
//!    errors by retryability, severity and criticality.
//!
//! 3. **`ErrorSeverity` enum**: the severity scale used in logs and in the
//!    `api-error` notifications the HTTP client broadcasts to UI layers.
//!
//! ## Composition
//!
//! Layer-specific errors embed `CommonError` rather than duplicating its
//! variants:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum StoreError {
//!     #[error("Credential store access failed: {0}")]
//!     AccessFailed(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```
//!
//! ## ErrorSeverity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Resource not found, validation rejected |
//! | **Warning** | Degraded but operational | Rate limiting, timeouts |
//! | **Error** | Failure requiring attention | Network errors, server errors |
//! | **Critical** | System integrity at risk | Corrupted credential store, invariant violations |

use std::fmt;
use std::time::Duration;

/// Common error variants that appear across multiple crates
#[derive(Debug, Clone)]
pub enum CommonError {
    /// Configuration-related errors
    Config { message: String },

    /// Serialization or deserialization errors
    Serialization { message: String, format: Option<String> },

    /// Data persistence errors (file I/O, keychain, etc.)
    Persistence { message: String, operation: Option<String> },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message } => write!(f, "Configuration error: {}", message),
            Self::Serialization { message, format } => {
                if let Some(format) = format {
                    write!(f, "Serialization error ({}): {}", format, message)
                } else {
                    write!(f, "Serialization error: {}", message)
                }
            }
            Self::Persistence { message, operation } => {
                if let Some(op) = operation {
                    write!(f, "Persistence error during '{}': {}", op, message)
                } else {
                    write!(f, "Persistence error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a serialization error with format information
    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a simple persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence { message: message.into(), operation: None }
    }

    /// Create a persistence error for a specific operation
    pub fn persistence_op<S: Into<String>, O: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }
}

/// Standard classification interface for error types
///
/// Implemented by every error type in the workspace so that retry decisions,
/// log levels and notification severities are computed the same way
/// everywhere.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are typically transient issues that may succeed if
    /// attempted again, such as:
    /// - Network timeouts
    /// - Rate limiting
    /// - Temporary service unavailability
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when a specific delay is known (e.g., from a
    /// Retry-After header), or `None` otherwise.
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

// Standard conversions from common error types
impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}
