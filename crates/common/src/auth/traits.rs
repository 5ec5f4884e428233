//! Traits for credential persistence
//!
//! The client persists its credentials through a small key-value seam so the
//! same refresh logic runs against a JSON file on desktop, the platform
//! keychain, or an in-memory map in tests.

use super::store::StoreError;

/// Durable key-value storage for credentials
///
/// Mirrors the semantics of browser local storage: string keys, string
/// values, last write wins. Implementations are called on the request path
/// and must not block for long.
pub trait CredentialStore: Send + Sync {
    /// Read a value
    ///
    /// # Returns
    /// `Ok(None)` when the key has never been written or was removed
    ///
    /// # Errors
    /// Returns error if the backing storage cannot be read
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one
    ///
    /// # Errors
    /// Returns error if the backing storage cannot be written
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value (idempotent)
    ///
    /// # Errors
    /// Returns error if the backing storage cannot be written
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Check whether a value exists for the key
    fn contains(&self, key: &str) -> bool {
        matches!(self.get(key), Ok(Some(_)))
    }
}
