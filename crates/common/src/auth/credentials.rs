//! Credential manager
//!
//! Owns the client's credentials:
//! - Access token cached in memory, falling back to the persisted store
//! - Optional refresh token
//! - Device id, generated once and reused until explicitly cleared
//!
//! Reads on the request path never fail: a store error is logged and treated
//! as "no value", because the pre-send hook must not abort a request over a
//! missing header.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::store::StoreError;
use super::traits::CredentialStore;
use super::types::{Credential, RefreshedTokens, StorageKeys};

/// Thread-safe access to the persisted credentials
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    keys: StorageKeys,
    access_token: RwLock<Option<String>>,
    device_id: Mutex<Option<String>>,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("keys", &self.keys)
            .field("has_cached_token", &self.access_token.read().is_some())
            .finish_non_exhaustive()
    }
}

impl CredentialManager {
    /// Create a manager over `store` using `keys`
    pub fn new(store: Arc<dyn CredentialStore>, keys: StorageKeys) -> Self {
        Self { store, keys, access_token: RwLock::new(None), device_id: Mutex::new(None) }
    }

    /// Storage keys in use
    #[must_use]
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Current access token
    ///
    /// Served from memory; on a cold cache the persisted value is loaded and
    /// cached. The load happens under the write lock so it cannot interleave
    /// with `clear_session` and bring back a removed token.
    pub fn access_token(&self) -> Option<String> {
        if let Some(token) = self.access_token.read().clone() {
            return Some(token);
        }

        let mut cached = self.access_token.write();
        if let Some(token) = cached.as_ref() {
            return Some(token.clone());
        }
        let persisted = self.read(&self.keys.access_token)?;
        Some(cached.insert(persisted).clone())
    }

    /// Replace the current access token
    ///
    /// The in-memory value is updated even if persisting fails, so the new
    /// token is used for the rest of the process lifetime.
    ///
    /// # Errors
    /// Returns error if the store rejects the write
    pub fn set_access_token(&self, token: &str) -> Result<(), StoreError> {
        let mut cached = self.access_token.write();
        *cached = Some(token.to_string());
        self.store.set(&self.keys.access_token, token)
    }

    /// Current refresh token, if the backend issued one
    pub fn refresh_token(&self) -> Option<String> {
        self.read(&self.keys.refresh_token)
    }

    /// Persist a refresh token
    ///
    /// # Errors
    /// Returns error if the store rejects the write
    pub fn set_refresh_token(&self, token: &str) -> Result<(), StoreError> {
        self.store.set(&self.keys.refresh_token, token)
    }

    /// Persist the result of a login or refresh call
    ///
    /// A missing refresh token leaves the stored one untouched.
    ///
    /// # Errors
    /// Returns error if the store rejects either write
    pub fn store_tokens(&self, tokens: &RefreshedTokens) -> Result<(), StoreError> {
        self.set_access_token(&tokens.access_token)?;
        if let Some(refresh) = &tokens.refresh_token {
            self.set_refresh_token(refresh)?;
        }
        debug!(rotated_refresh = tokens.refresh_token.is_some(), "Tokens stored");
        Ok(())
    }

    /// Device id, generated and persisted on first use
    ///
    /// Generation happens under a lock so concurrent first calls agree on a
    /// single id.
    pub fn device_id(&self) -> String {
        let mut cached = self.device_id.lock();
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let id = match self.read(&self.keys.device_id) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                if let Err(e) = self.store.set(&self.keys.device_id, &id) {
                    warn!(error = %e, "Failed to persist generated device id");
                }
                info!(device_id = %id, "Generated new device id");
                id
            }
        };

        *cached = Some(id.clone());
        id
    }

    /// Whether an access token is available
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Current credentials
    pub fn snapshot(&self) -> Credential {
        Credential {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
            device_id: self.device_id(),
        }
    }

    /// Drop access and refresh tokens (session end); the device id survives
    ///
    /// # Errors
    /// Returns the first store error; every key is still attempted
    pub fn clear_session(&self) -> Result<(), StoreError> {
        // Held until the store is cleared; cold-cache reads wait on it.
        let mut cached = self.access_token.write();
        *cached = None;

        let access = self.store.remove(&self.keys.access_token);
        let refresh = self.store.remove(&self.keys.refresh_token);
        drop(cached);

        info!("Session credentials cleared");
        access.and(refresh)
    }

    /// Drop every credential including the device id
    ///
    /// # Errors
    /// Returns the first store error; every key is still attempted
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let session = self.clear_session();

        *self.device_id.lock() = None;
        let device = self.store.remove(&self.keys.device_id);

        session.and(device)
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = %key, error = %e, "Credential store read failed");
                None
            }
        }
    }
}
