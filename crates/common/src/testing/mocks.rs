//! Mock implementations of common traits
//!
//! Provides credential store doubles for testing purposes.

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::sync::Arc;

use parking_lot::Mutex;

use crate::auth::{CredentialStore, MemoryStore, StoreError};

/// A store operation captured by [`RecordingStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// `get(key)`
    Get(String),
    /// `set(key, value)`
    Set(String, String),
    /// `remove(key)`
    Remove(String),
}

/// Credential store whose every operation fails
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "test-utils")]
/// # {
/// use storefront_common::auth::CredentialStore;
/// use storefront_common::testing::FailingStore;
///
/// let store = FailingStore::default();
/// assert!(store.get("access-token").is_err());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FailingStore {
    message: String,
}

impl FailingStore {
    /// Create a failing store with a custom error message
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new("storage unavailable")
    }
}

impl CredentialStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::AccessFailed(self.message.clone()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::AccessFailed(self.message.clone()))
    }

    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::AccessFailed(self.message.clone()))
    }
}

/// In-memory store that records every operation
///
/// Clones share both the data and the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    log: Arc<Mutex<Vec<StoreOp>>>,
}

impl RecordingStore {
    /// Create an empty recording store
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations seen so far, oldest first
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.log.lock().clone()
    }

    /// Number of `set` calls for `key`
    #[must_use]
    pub fn writes_to(&self, key: &str) -> usize {
        self.log.lock().iter().filter(|op| matches!(op, StoreOp::Set(k, _) if k == key)).count()
    }

    /// Underlying data
    #[must_use]
    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }
}

impl CredentialStore for RecordingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.log.lock().push(StoreOp::Get(key.to_string()));
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.log.lock().push(StoreOp::Set(key.to_string(), value.to_string()));
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.log.lock().push(StoreOp::Remove(key.to_string()));
        self.inner.remove(key)
    }
}
