//! # Storefront Infrastructure
//!
//! The authenticated HTTP client shared by the storefront and the
//! operations dashboard.
//!
//! This crate contains:
//! - The [`Transport`] seam and its reqwest implementation
//! - [`AuthenticatedHttpClient`]: bearer/device headers, single-flight token
//!   refresh, error normalization and event broadcasting
//! - Configuration loading from env vars and files
//! - `tracing` subscriber setup
//!
//! ## Architecture
//! - Credential storage and token extraction live in `storefront-common`
//! - Contains all "impure" code (network I/O, environment, files)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use storefront_common::auth::MemoryStore;
//! use storefront_infra::{AuthenticatedHttpClient, ClientConfig};
//!
//! # async fn run() -> Result<(), storefront_infra::ApiError> {
//! let client = AuthenticatedHttpClient::new(
//!     ClientConfig::with_base_url("https://shop.example.com/api"),
//!     Arc::new(MemoryStore::new()),
//! )?;
//!
//! client.on_session_expired(|event| {
//!     tracing::info!(redirect = %event.redirect, "Sign-in required");
//! });
//!
//! let orders: serde_json::Value = client.get("/orders").await?;
//! # let _ = orders;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::{ApiError, ApiRequest, ApiResponse, AuthenticatedHttpClient, ClientEvent};
pub use config::{ClientConfig, ConfigError};
pub use http::{HttpClient, Transport, TransportError};
