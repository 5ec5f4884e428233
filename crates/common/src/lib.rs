//! Common building blocks shared across the storefront crates.
//!
//! # Modules
//!
//! - [`error`]: shared error variants, classification and severity
//! - [`auth`]: credential stores, credential manager, token extraction policy
//! - `testing`: store doubles (enabled by the `test-utils` feature)
//!
//! # Features
//!
//! - `keychain`: platform keychain credential store
//! - `test-utils`: test doubles for downstream crates

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod error;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use auth::{CredentialManager, CredentialStore, StoreError};
pub use error::{CommonError, ErrorClassification, ErrorSeverity};
