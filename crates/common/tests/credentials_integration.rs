//! Integration tests for credential persistence
//!
//! Exercises the credential manager over the on-disk store the way an
//! application restart would: a second manager over the same file must see
//! the first manager's writes.

use std::sync::Arc;

use storefront_common::auth::{
    CredentialManager, CredentialStore, FileStore, RefreshedTokens, StorageKeys, StoreError,
};
use storefront_common::ErrorClassification;

fn manager_at(path: &std::path::Path) -> CredentialManager {
    CredentialManager::new(Arc::new(FileStore::new(path)), StorageKeys::default())
}

/// Validates that credentials survive a reload.
///
/// # Test Steps
/// 1. Store tokens and generate a device id through one manager
/// 2. Open a second manager over the same file
/// 3. Verify tokens and device id match
#[test]
fn test_credentials_survive_reload() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("credentials.json");

    let first = manager_at(&path);
    first
        .store_tokens(&RefreshedTokens {
            access_token: "T1".to_string(),
            refresh_token: Some("R1".to_string()),
        })
        .unwrap();
    let device_id = first.device_id();

    let reloaded = manager_at(&path);
    let snapshot = reloaded.snapshot();
    assert_eq!(snapshot.access_token.as_deref(), Some("T1"));
    assert_eq!(snapshot.refresh_token.as_deref(), Some("R1"));
    assert_eq!(snapshot.device_id, device_id);
}

/// Validates session end and full reset.
///
/// Assertions:
/// - `clear_session` keeps the device id on disk
/// - `clear_all` leads to a new device id after reload
#[test]
fn test_clear_session_then_clear_all() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("credentials.json");

    let manager = manager_at(&path);
    manager.set_access_token("T1").unwrap();
    let device_id = manager.device_id();

    manager.clear_session().unwrap();
    let reloaded = manager_at(&path);
    assert!(!reloaded.is_authenticated());
    assert_eq!(reloaded.device_id(), device_id);

    reloaded.clear_all().unwrap();
    assert_ne!(manager_at(&path).device_id(), device_id);
}

/// Validates custom storage keys land in the file under those names.
#[test]
fn test_custom_storage_keys() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("credentials.json");
    let keys = StorageKeys {
        access_token: "token".to_string(),
        refresh_token: "refreshToken".to_string(),
        device_id: "deviceId".to_string(),
    };

    let manager = CredentialManager::new(Arc::new(FileStore::new(&path)), keys);
    manager.set_access_token("T1").unwrap();
    manager.device_id();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["token"], "T1");
    assert!(raw["deviceId"].as_str().is_some_and(|id| !id.is_empty()));
}

/// Validates that a corrupted file is reported, not silently replaced.
#[test]
fn test_corrupted_file_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = FileStore::new(&path);
    let err = store.get("access-token").unwrap_err();
    assert!(matches!(err, StoreError::Corrupted(_)));
    assert!(err.is_critical());

    // The manager degrades to "no token" on the request path.
    assert_eq!(manager_at(&path).access_token(), None);
}
