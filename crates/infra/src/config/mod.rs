//! Configuration loading and management
//!
//! [`ClientConfig`] holds the client settings; [`loader`] builds it from
//! environment variables and files.

pub mod loader;
pub mod settings;

// Re-export commonly used items
pub use loader::{apply_env_overrides, load, load_from_env, load_from_file, probe_config_paths};
pub use settings::{ClientConfig, ConfigError};
