//! Configuration management for remote-tail

mod serde_utils;
mod sink;
mod tail;

pub use serde_utils::duration_secs;
pub use sink::{SinkSettings, TlsFiles};
pub use tail::{ServerEntry, TailConfig, DEFAULT_SSH_PORT};

use crate::error::ConfigError;
use std::path::Path;

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}
