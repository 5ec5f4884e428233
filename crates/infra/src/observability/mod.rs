//! Logging setup
//!
//! The client only emits `tracing` events; applications embedding it call
//! [`init_tracing`] once at startup (or install their own subscriber).
//!
//! - `RUST_LOG` is honoured; without it the client logs at `info`.
//! - `STOREFRONT_LOG_FORMAT=json` switches to newline-delimited JSON.

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "storefront_infra=info,storefront_common=info,warn";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, one line per event
    #[default]
    Pretty,
    /// Newline-delimited JSON for log shippers
    Json,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to [`LogFormat::Pretty`]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }

    /// Read `STOREFRONT_LOG_FORMAT`
    pub fn from_env() -> Self {
        std::env::var("STOREFRONT_LOG_FORMAT").map(|v| Self::parse(&v)).unwrap_or_default()
    }
}

/// Build the env filter, falling back to [`DEFAULT_FILTER`]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a global subscriber
///
/// # Errors
/// Returns error if a global subscriber is already set.
pub fn init_tracing(format: LogFormat) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter());

    match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => {
            registry.with(fmt::layer().json().with_current_span(true)).try_init()
        }
    }
}
