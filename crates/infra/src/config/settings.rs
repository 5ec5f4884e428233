//! Client settings
//!
//! Every header name, path and storage key the client relies on is a field
//! here, so a backend with different conventions needs no code change.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use storefront_common::auth::StorageKeys;
use storefront_common::error::CommonError;
use thiserror::Error;
use url::Url;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value failed to parse or validate; `var` names the env var or field
    #[error("Invalid value for {var}: {message}")]
    Invalid { var: String, message: String },

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ConfigError {
    pub fn invalid(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid { var: var.into(), message: message.into() }
    }
}

/// Authenticated client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix for relative request paths
    pub base_url: String,
    /// Per-request timeout
    pub timeout_ms: u64,
    /// Timeout of the refresh call
    pub refresh_timeout_ms: u64,
    pub refresh_path: String,
    /// Paths whose auth failures are returned as-is (substring match)
    pub auth_exempt_paths: Vec<String>,
    pub health_path: String,
    pub device_header: String,
    /// JSON field carrying the refresh token in the refresh request body
    pub refresh_token_field: String,
    /// Window in which identical events are broadcast once
    pub event_dedup_window_ms: u64,
    /// Carried by the session-expired event
    pub session_expired_redirect: String,
    pub storage_keys: StorageKeys,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_ms: 15_000,
            refresh_timeout_ms: 15_000,
            refresh_path: "/auth/refresh".to_string(),
            auth_exempt_paths: vec![
                "/auth/login".to_string(),
                "/auth/verify".to_string(),
                "/auth/refresh".to_string(),
            ],
            health_path: "/health".to_string(),
            device_header: "X-Device-Id".to_string(),
            refresh_token_field: "refreshToken".to_string(),
            event_dedup_window_ms: 3_000,
            session_expired_redirect: "/login".to_string(),
            storage_keys: StorageKeys::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults with a different base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn event_dedup_window(&self) -> Duration {
        Duration::from_millis(self.event_dedup_window_ms)
    }

    /// Whether auth failures on `path` bypass the refresh flow
    pub fn is_auth_exempt(&self, path: &str) -> bool {
        self.is_refresh_path(path)
            || self.auth_exempt_paths.iter().any(|p| !p.is_empty() && path.contains(p.as_str()))
    }

    pub fn is_refresh_path(&self, path: &str) -> bool {
        path.contains(self.refresh_path.as_str())
    }

    /// Absolute URL for `path`; absolute inputs are returned unchanged
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Check the settings are usable
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("base_url", "must not be empty"));
        }
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::invalid("base_url", format!("{}: {e}", self.base_url)))?;

        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("timeout_ms", "must be greater than zero"));
        }
        if self.refresh_timeout_ms == 0 {
            return Err(ConfigError::invalid("refresh_timeout_ms", "must be greater than zero"));
        }
        if !self.refresh_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "refresh_path",
                format!("'{}' must start with '/'", self.refresh_path),
            ));
        }
        if reqwest::header::HeaderName::from_bytes(self.device_header.as_bytes()).is_err() {
            return Err(ConfigError::invalid(
                "device_header",
                format!("'{}' is not a valid header name", self.device_header),
            ));
        }
        if self.refresh_token_field.trim().is_empty() {
            return Err(ConfigError::invalid("refresh_token_field", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(15));
        assert_eq!(config.device_header, "X-Device-Id");
    }

    #[test]
    fn test_url_for_joins_slashes_once() {
        let config = ClientConfig::with_base_url("http://shop.test/api/");
        assert_eq!(config.url_for("/orders"), "http://shop.test/api/orders");
        assert_eq!(config.url_for("orders?page=2"), "http://shop.test/api/orders?page=2");
        assert_eq!(config.url_for("https://cdn.test/x"), "https://cdn.test/x");
    }

    #[test]
    fn test_exempt_paths_match_by_substring() {
        let config = ClientConfig::default();
        assert!(config.is_auth_exempt("/auth/login"));
        assert!(config.is_auth_exempt("/v2/auth/verify?code=1"));
        assert!(config.is_auth_exempt("/auth/refresh"));
        assert!(!config.is_auth_exempt("/orders"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases = [
            (ClientConfig { base_url: String::new(), ..Default::default() }, "base_url"),
            (ClientConfig { base_url: "not a url".into(), ..Default::default() }, "base_url"),
            (ClientConfig { timeout_ms: 0, ..Default::default() }, "timeout_ms"),
            (ClientConfig { refresh_path: "auth/refresh".into(), ..Default::default() }, "refresh_path"),
            (ClientConfig { device_header: "X Device".into(), ..Default::default() }, "device_header"),
        ];

        for (config, field) in cases {
            match config.validate() {
                Err(ConfigError::Invalid { var, .. }) => assert_eq!(var, field),
                other => panic!("expected invalid {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
base_url = "https://shop.test/api"
device_header = "X-Client-Id"

[storage_keys]
access_token = "token"
"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://shop.test/api");
        assert_eq!(config.device_header, "X-Client-Id");
        assert_eq!(config.storage_keys.access_token, "token");
        assert_eq!(config.storage_keys.device_id, "device-id");
        assert_eq!(config.refresh_path, "/auth/refresh");
    }
}
