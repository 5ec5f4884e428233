//! Platform keychain credential store
//!
//! Persists each credential key as its own keychain entry under a service
//! name (macOS Keychain, Windows Credential Manager, Linux Secret Service).
//!
//! ```no_run
//! use storefront_common::auth::{CredentialStore, KeychainStore};
//!
//! let store = KeychainStore::new("Storefront.admin");
//! store.set("device-id", "3f1c...")?;
//! # Ok::<(), storefront_common::auth::StoreError>(())
//! ```

use keyring::Entry;
use tracing::debug;

use super::store::StoreError;
use super::traits::CredentialStore;

/// Credential store backed by the platform keychain
pub struct KeychainStore {
    service_name: String,
}

impl KeychainStore {
    /// Create a store for a keychain service (e.g. "Storefront.admin")
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    /// Keychain service name
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service_name, key).map_err(|e| {
            StoreError::AccessFailed(format!("Failed to open keychain entry {}: {}", key, e))
        })
    }
}

impl CredentialStore for KeychainStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        debug!(service = %self.service_name, key = %key, "Reading keychain entry");

        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::AccessFailed(format!(
                "Failed to read keychain entry {}: {}",
                key, e
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        debug!(service = %self.service_name, key = %key, "Writing keychain entry");

        self.entry(key)?.set_password(value).map_err(|e| {
            StoreError::AccessFailed(format!("Failed to write keychain entry {}: {}", key, e))
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        debug!(service = %self.service_name, key = %key, "Deleting keychain entry");

        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::AccessFailed(format!(
                "Failed to delete keychain entry {}: {}",
                key, e
            ))),
        }
    }
}
