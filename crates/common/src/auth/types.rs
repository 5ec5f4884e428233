//! Credential types and the token extraction policy
//!
//! Backends in the wild disagree on where a refreshed token lives in the
//! response body (`accessToken`, `access_token`, `token`, sometimes nested
//! under `data`). [`TokenPolicy`] makes that compatibility shim an explicit,
//! ordered list of named extractors instead of ad-hoc optional chaining.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot of the credentials the client currently holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token attached to authenticated requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Longer-lived token used only to obtain a new access token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Stable identifier for this installation
    pub device_id: String,
}

/// Keys under which credentials are persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub access_token: String,
    pub refresh_token: String,
    pub device_id: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            access_token: "access-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            device_id: "device-id".to_string(),
        }
    }
}

/// A named location to look for a string field in a JSON body
///
/// `pointer` uses RFC 6901 JSON Pointer syntax (`/data/token`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenExtractor {
    pub name: &'static str,
    pub pointer: &'static str,
}

impl TokenExtractor {
    /// Create an extractor
    #[must_use]
    pub const fn new(name: &'static str, pointer: &'static str) -> Self {
        Self { name, pointer }
    }

    /// Return the field as a non-empty string, if present
    #[must_use]
    pub fn extract<'a>(&self, body: &'a Value) -> Option<&'a str> {
        body.pointer(self.pointer).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
    }
}

const ACCESS_TOKEN_EXTRACTORS: &[TokenExtractor] = &[
    TokenExtractor::new("accessToken", "/accessToken"),
    TokenExtractor::new("access_token", "/access_token"),
    TokenExtractor::new("token", "/token"),
    TokenExtractor::new("data.accessToken", "/data/accessToken"),
    TokenExtractor::new("data.access_token", "/data/access_token"),
    TokenExtractor::new("data.token", "/data/token"),
];

const REFRESH_TOKEN_EXTRACTORS: &[TokenExtractor] = &[
    TokenExtractor::new("refreshToken", "/refreshToken"),
    TokenExtractor::new("refresh_token", "/refresh_token"),
    TokenExtractor::new("data.refreshToken", "/data/refreshToken"),
    TokenExtractor::new("data.refresh_token", "/data/refresh_token"),
];

/// Ordered list of extractors; the first non-empty match wins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    extractors: Vec<TokenExtractor>,
}

impl TokenPolicy {
    /// Build a policy from an explicit extractor order
    #[must_use]
    pub fn new(extractors: Vec<TokenExtractor>) -> Self {
        Self { extractors }
    }

    /// Access token shapes accepted from the refresh endpoint
    #[must_use]
    pub fn access_token() -> Self {
        Self::new(ACCESS_TOKEN_EXTRACTORS.to_vec())
    }

    /// Rotated refresh token shapes accepted from the refresh endpoint
    #[must_use]
    pub fn refresh_token() -> Self {
        Self::new(REFRESH_TOKEN_EXTRACTORS.to_vec())
    }

    /// Run the extractors in order
    ///
    /// # Returns
    /// The matching extractor's name and the extracted value
    #[must_use]
    pub fn extract<'a>(&self, body: &'a Value) -> Option<(&'static str, &'a str)> {
        self.extractors.iter().find_map(|ex| ex.extract(body).map(|value| (ex.name, value)))
    }

    /// Extractor names in evaluation order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.extractors.iter().map(|ex| ex.name)
    }
}

/// Tokens obtained from a successful refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    /// Present only when the backend rotates refresh tokens
    pub refresh_token: Option<String>,
}

impl RefreshedTokens {
    /// Parse a refresh response body with the default policies
    ///
    /// # Returns
    /// `None` when no access token shape matches
    #[must_use]
    pub fn from_body(body: &Value) -> Option<Self> {
        Self::from_body_with(body, &TokenPolicy::access_token(), &TokenPolicy::refresh_token())
    }

    /// Parse a refresh response body with explicit policies
    #[must_use]
    pub fn from_body_with(
        body: &Value,
        access: &TokenPolicy,
        refresh: &TokenPolicy,
    ) -> Option<Self> {
        let (_, access_token) = access.extract(body)?;
        let refresh_token = refresh.extract(body).map(|(_, value)| value.to_string());
        Some(Self { access_token: access_token.to_string(), refresh_token })
    }
}
