//! Configuration loader
//!
//! Loads [`ClientConfig`] from defaults, a config file and environment
//! variables.
//!
//! ## Loading Strategy
//! 1. A `.env` file is read when present (existing variables win)
//! 2. A config file is used as the base when `STOREFRONT_CONFIG` names one or
//!    one is found by [`probe_config_paths`]; otherwise the defaults are
//! 3. Environment variables override individual fields
//! 4. The result is validated
//!
//! ## Environment Variables
//! - `STOREFRONT_CONFIG`: explicit config file path
//! - `STOREFRONT_API_URL`: base URL
//! - `STOREFRONT_API_TIMEOUT_MS`: per-request timeout in milliseconds
//! - `STOREFRONT_API_REFRESH_TIMEOUT_MS`: refresh call timeout in milliseconds
//! - `STOREFRONT_API_REFRESH_PATH`: refresh endpoint path
//! - `STOREFRONT_API_AUTH_EXEMPT`: comma separated auth-exempt paths
//! - `STOREFRONT_API_HEALTH_PATH`: health probe path
//! - `STOREFRONT_API_DEVICE_HEADER`: device id header name
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./storefront.toml`, `./storefront.json`, `./config.toml`,
//!    `./config.json` (current working directory)
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};

use storefront_common::error::CommonError;

use super::settings::{ClientConfig, ConfigError};

pub const ENV_CONFIG_PATH: &str = "STOREFRONT_CONFIG";
pub const ENV_API_URL: &str = "STOREFRONT_API_URL";
pub const ENV_TIMEOUT_MS: &str = "STOREFRONT_API_TIMEOUT_MS";
pub const ENV_REFRESH_TIMEOUT_MS: &str = "STOREFRONT_API_REFRESH_TIMEOUT_MS";
pub const ENV_REFRESH_PATH: &str = "STOREFRONT_API_REFRESH_PATH";
pub const ENV_AUTH_EXEMPT: &str = "STOREFRONT_API_AUTH_EXEMPT";
pub const ENV_HEALTH_PATH: &str = "STOREFRONT_API_HEALTH_PATH";
pub const ENV_DEVICE_HEADER: &str = "STOREFRONT_API_DEVICE_HEADER";

const CONFIG_FILE_NAMES: &[&str] =
    &["storefront.toml", "storefront.json", "config.toml", "config.json"];

/// Load configuration with the full strategy described in the module docs
///
/// # Errors
/// Returns `ConfigError` if the config file is unreadable or malformed, an
/// environment variable does not parse, or validation fails.
pub fn load() -> Result<ClientConfig, ConfigError> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let explicit = std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from);
    let base = match explicit.or_else(probe_config_paths) {
        Some(path) => read_config_file(&path)?,
        None => {
            tracing::debug!("No config file found, using defaults");
            ClientConfig::default()
        }
    };

    let config = apply_env_overrides(base, |key| std::env::var(key).ok())?;
    config.validate()?;
    tracing::info!(base_url = %config.base_url, "Client configuration loaded");
    Ok(config)
}

/// Load configuration from defaults and environment variables only
///
/// # Errors
/// Returns `ConfigError::Invalid` if a variable has an invalid value.
pub fn load_from_env() -> Result<ClientConfig, ConfigError> {
    let config = apply_env_overrides(ClientConfig::default(), |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Supports JSON and
/// TOML (detected by extension); missing fields take their defaults.
///
/// # Errors
/// Returns `ConfigError` if no file is found, the format is unsupported or
/// invalid, or validation fails.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    let config_path = match path {
        Some(p) => p,
        None => probe_config_paths().ok_or_else(|| {
            ConfigError::NotFound("no config file in any of the standard locations".to_string())
        })?,
    };

    let config = read_config_file(&config_path)?;
    config.validate()?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<ClientConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CommonError::config(format!("Failed to read config file {}: {e}", path.display()))
    })?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| {
            ConfigError::Common(CommonError::serialization_format("toml", e.to_string()))
        }),
        "json" => serde_json::from_str(contents).map_err(|e| {
            ConfigError::Common(CommonError::serialization_format("json", e.to_string()))
        }),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
        dirs.push(cwd.join("../.."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Apply `STOREFRONT_*` overrides read through `lookup`
///
/// Empty values are ignored.
///
/// # Errors
/// Returns `ConfigError::Invalid` naming the variable that failed to parse.
pub fn apply_env_overrides<F>(
    mut config: ClientConfig,
    lookup: F,
) -> Result<ClientConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(url) = var(ENV_API_URL) {
        config.base_url = url;
    }
    if let Some(raw) = var(ENV_TIMEOUT_MS) {
        config.timeout_ms = parse_millis(ENV_TIMEOUT_MS, &raw)?;
    }
    if let Some(raw) = var(ENV_REFRESH_TIMEOUT_MS) {
        config.refresh_timeout_ms = parse_millis(ENV_REFRESH_TIMEOUT_MS, &raw)?;
    }
    if let Some(path) = var(ENV_REFRESH_PATH) {
        config.refresh_path = path;
    }
    if let Some(raw) = var(ENV_AUTH_EXEMPT) {
        config.auth_exempt_paths = raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(path) = var(ENV_HEALTH_PATH) {
        config.health_path = path;
    }
    if let Some(header) = var(ENV_DEVICE_HEADER) {
        config.device_header = header;
    }

    Ok(config)
}

fn parse_millis(var: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|e| ConfigError::invalid(var, format!("'{raw}': {e}")))
}
