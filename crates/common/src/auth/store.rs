//! Credential store implementations
//!
//! - [`MemoryStore`]: process-local map; clones share the same data, which
//!   is how tests simulate a page reload over retained storage.
//! - [`FileStore`]: JSON object on disk, rewritten atomically on every change.
//! - `KeychainStore` (feature `keychain`): platform keychain, see
//!   [`super::keychain`].

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::debug;

use super::traits::CredentialStore;
use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

/// Errors raised by credential stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing storage rejected the operation
    #[error("Credential store access failed: {0}")]
    AccessFailed(String),

    /// Stored data could not be decoded
    #[error("Credential store is corrupted: {0}")]
    Corrupted(String),

    /// Shared persistence/serialization failure
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ErrorClassification for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::AccessFailed(_) => true,
            Self::Corrupted(_) => false,
            Self::Common(e) => e.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AccessFailed(_) => ErrorSeverity::Error,
            Self::Corrupted(_) => ErrorSeverity::Critical,
            Self::Common(e) => e.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Corrupted(_))
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        None
    }
}

/// In-memory credential store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every key
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// JSON file credential store
///
/// The file holds a flat JSON object of string values. Every read goes to
/// disk so that a second process (or a restarted one) sees the latest
/// values; writes go through a temporary file in the same directory and an
/// atomic rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store backed by `path`
    ///
    /// The file and its parent directory are created lazily on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(CommonError::persistence_op("read", e.to_string()).into()),
        };

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            StoreError::Corrupted(format!("{}: {}", self.path.display(), e))
        })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(CommonError::from)?;

        let json = serde_json::to_vec_pretty(entries).map_err(CommonError::from)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(CommonError::from)?;
        tmp.write_all(&json).map_err(CommonError::from)?;
        tmp.as_file().sync_all().map_err(CommonError::from)?;
        tmp.persist(&self.path)
            .map_err(|e| CommonError::persistence_op("rename", e.error.to_string()))?;

        debug!(path = %self.path.display(), keys = entries.len(), "Credential file written");
        Ok(())
    }

    fn update<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self.write_lock.lock();
        let mut entries = self.load()?;
        if mutate(&mut entries) {
            self.save(&entries)?;
        }
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| entries.remove(key).is_some())
    }
}
