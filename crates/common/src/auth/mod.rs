//! Credential persistence and token handling
//!
//! This module owns everything the HTTP client needs to know about
//! credentials, independent of any transport.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  CredentialManager  │  token cache, device id lifecycle
//! └──────────┬──────────┘
//!            │
//!            └──► CredentialStore   (MemoryStore / FileStore / KeychainStore)
//!
//! TokenPolicy  ordered extractors for refresh responses
//! ```
//!
//! # Usage Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use storefront_common::auth::{CredentialManager, MemoryStore, StorageKeys};
//!
//! let manager = CredentialManager::new(Arc::new(MemoryStore::new()), StorageKeys::default());
//! let device_id = manager.device_id();
//! assert_eq!(manager.device_id(), device_id);
//! assert!(!manager.is_authenticated());
//! ```

pub mod credentials;
#[cfg(feature = "keychain")]
mod keychain;
pub mod store;
pub mod traits;
pub mod types;

pub use credentials::CredentialManager;
#[cfg(feature = "keychain")]
pub use keychain::KeychainStore;
pub use store::{FileStore, MemoryStore, StoreError};
pub use traits::CredentialStore;
pub use types::{Credential, RefreshedTokens, StorageKeys, TokenExtractor, TokenPolicy};
