//! Configuration types for the DIRO generation client.
//!
//! Controls where the backend lives, how fast the decorative messages rotate,
//! and where exported documents are written.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DiroError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "diro.json";

/// Environment variable that overrides `backendUrl`.
pub const BACKEND_URL_ENV: &str = "DIRO_BACKEND_URL";

/// Default backend base URL.
fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

/// Default decorative message rotation interval in milliseconds.
const fn default_message_interval_ms() -> u64 {
    5000
}

/// Default timeout for export and download requests in seconds.
const fn default_request_timeout() -> u64 {
    30
}

/// Default directory for downloaded exports.
fn default_download_dir() -> String {
    ".".to_string()
}

/// Default per-observer buffer for session updates.
const fn default_broadcast_capacity() -> usize {
    100
}

/// Main configuration for the DIRO client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the generation backend, without the `/api` suffix.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Interval between decorative message rotations, in milliseconds.
    #[serde(default = "default_message_interval_ms")]
    pub message_interval_ms: u64,

    /// Timeout for export, download and health requests, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Directory where downloaded exports are written.
    #[serde(default = "default_download_dir")]
    pub download_dir: String,

    /// Buffer size for each session update observer.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            message_interval_ms: default_message_interval_ms(),
            request_timeout_secs: default_request_timeout(),
            download_dir: default_download_dir(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `diro.json` in the current directory, then applies the
    /// `DIRO_BACKEND_URL` environment override.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON or
    /// invalid values.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            DiroError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        let config_path = current_dir.join(CONFIG_FILE_NAME);
        let mut config = Self::load_from_file(&config_path)?;
        config.apply_env_override(std::env::var(BACKEND_URL_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::ConfigParseError` if the file exists but contains
    /// invalid JSON, and `DiroError::ConfigValidationError` if the values are
    /// out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(DiroError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| DiroError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces `backend_url` with a non-blank override value.
    pub fn apply_env_override(&mut self, backend_url: Option<String>) {
        if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
            tracing::debug!(backend_url = %url, "Using backend URL from environment");
            self.backend_url = url.trim().to_string();
        }
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        let url = self.backend_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(DiroError::config_validation(
                format!("backendUrl must start with http:// or https:// (got '{url}')"),
                "Set backendUrl to something like http://localhost:8000 in your diro.json",
            ));
        }

        if self.message_interval_ms == 0 {
            return Err(DiroError::config_validation(
                "messageIntervalMs must be greater than 0",
                "Set messageIntervalMs to at least 1 in your diro.json",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(DiroError::config_validation(
                "requestTimeoutSecs must be greater than 0",
                "Set requestTimeoutSecs to at least 1 second in your diro.json",
            ));
        }

        if self.download_dir.trim().is_empty() {
            return Err(DiroError::config_validation(
                "downloadDir must not be empty",
                "Provide a download directory in your diro.json (use '.' for current directory)",
            ));
        }

        if self.broadcast_capacity == 0 {
            return Err(DiroError::config_validation(
                "broadcastCapacity must be greater than 0",
                "Set broadcastCapacity to at least 1 in your diro.json",
            ));
        }

        Ok(())
    }

    /// The decorative message rotation interval.
    #[must_use]
    pub const fn message_interval(&self) -> Duration {
        Duration::from_millis(self.message_interval_ms)
    }

    /// The timeout applied to export, download and health requests.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
