//! Error types for the DIRO generation client.
//!
//! This module defines the error hierarchy for all client operations,
//! including configuration loading, form validation, the generation event
//! stream, and the export API.

use std::path::PathBuf;

/// A specialized `Result` type for DIRO client operations.
pub type Result<T> = std::result::Result<T, DiroError>;

/// Errors that can occur while preparing, running, or exporting a generation.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum DiroError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your diro.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Form Validation Errors
    // ========================================================================
    /// A required generation parameter is missing or out of range.
    ///
    /// Raised before a session starts; the controller state is untouched.
    #[error("Invalid {field}: {message}")]
    InvalidParameter {
        /// The form field that failed validation.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// The decorative message list was empty.
    #[error("Rotating message list must not be empty")]
    EmptyMessageList,

    // ========================================================================
    // Generation Stream Errors
    // ========================================================================
    /// The event stream connection failed or closed unexpectedly.
    #[error("Generation stream failed: {message}\n\nSuggestion: Check that the backend at {endpoint} is reachable, then generate again")]
    StreamTransport {
        /// The endpoint the stream was opened against.
        endpoint: String,
        /// Description of the transport failure.
        message: String,
    },

    // ========================================================================
    // Export Errors
    // ========================================================================
    /// The export or download endpoint rejected the request.
    #[error("Export failed ({status}): {message}")]
    ExportFailed {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Body or description returned by the backend.
        message: String,
    },

    /// A catalogue or one-shot generation request was rejected.
    #[error("Request to {endpoint} failed ({status}): {message}")]
    RequestFailed {
        /// The endpoint path that was called.
        endpoint: String,
        /// HTTP status code returned by the backend.
        status: u16,
        /// Body or description returned by the backend.
        message: String,
    },

    /// The backend health check did not report `ok`.
    #[error("Backend service is not healthy: {status}\n\nSuggestion: Verify the backendUrl setting and that the service is running")]
    Unhealthy {
        /// Status string reported by the backend.
        status: String,
    },

    /// The configured backend URL could not be combined into a request URL.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Description of the parse failure.
        message: String,
    },

    // ========================================================================
    // General Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DiroError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `InvalidParameter` error for a form field.
    #[must_use]
    pub fn invalid_parameter(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            message: message.into(),
        }
    }

    /// Creates a new `StreamTransport` error.
    #[must_use]
    pub fn stream_transport(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StreamTransport {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ExportFailed` error.
    #[must_use]
    pub fn export_failed(status: u16, message: impl Into<String>) -> Self {
        Self::ExportFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a new `RequestFailed` error.
    #[must_use]
    pub fn request_failed(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a new `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the failure happened before any request was made
    /// because the user's input was incomplete.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. })
    }

    /// Returns `true` if this error is transient and a manual retry may succeed.
    ///
    /// The client never retries on its own; this only informs what to tell
    /// the user.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::StreamTransport { .. } | Self::Unhealthy { .. } => true,
            Self::ExportFailed { status, .. } | Self::RequestFailed { status, .. } => {
                *status == 429 || *status >= 500
            }
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
