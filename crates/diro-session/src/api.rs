//! HTTP client for the DIRO generation backend.
//!
//! # Endpoints
//!
//! - `GET /api/generate_stream` - Server-sent generation events (see [`SseEventSource`])
//! - `POST /api/generate` - One-shot generation returning the full output
//! - `GET /api/grades`, `GET /api/material_types`, `GET /api/difficulty_levels` - Catalogues
//! - `POST /api/export` - Render final text to a server-side file
//! - `GET /api/download?file_path=...` - Fetch an exported file
//! - `GET /api/health` - Connectivity check
//!
//! The client never retries; callers decide whether to try again using
//! [`DiroError::is_transient`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{DiroError, Result};
use crate::params::GenerationRequest;
use crate::source::SseEventSource;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Document formats the export endpoint can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Portable Document Format.
    Pdf,
    /// Word document.
    Docx,
}

impl ExportFormat {
    /// File extension for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Request body for `POST /api/export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Text to render.
    pub text: String,
    /// Target format.
    pub filetype: ExportFormat,
}

/// Response body for `POST /api/export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    /// Server-side reference to the rendered file.
    pub file_path: String,
}

/// Response body for `POST /api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// The generated material.
    pub output: String,
}

/// Response body for `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` when the service is healthy.
    pub status: String,
}

// ============================================================================
// ApiClient
// ============================================================================

/// Client for the backend's REST and streaming endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    /// Creates a client for the backend at `base_url`.
    ///
    /// `timeout` applies to export, download and health requests only; the
    /// generation stream has no total timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Creates a client from loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.backend_url, config.request_timeout())
    }

    /// The backend base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// An event source sharing this client's connection pool.
    #[must_use]
    pub fn event_source(&self) -> SseEventSource {
        SseEventSource::new(self.http.clone(), self.base_url.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Checks that the backend reports itself healthy.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::Http` if the request fails and
    /// `DiroError::Unhealthy` if the reported status is not `ok`.
    pub async fn health_check(&self) -> Result<()> {
        let response = self
            .http
            .get(self.url("/api/health"))
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DiroError::Unhealthy {
                status: response.status().to_string(),
            });
        }

        let body: HealthResponse = response.json().await?;
        if body.status != "ok" {
            return Err(DiroError::Unhealthy {
                status: body.status,
            });
        }
        debug!(base_url = %self.base_url, "Backend is healthy");
        Ok(())
    }

    /// Generates material in a single request, without progress events.
    ///
    /// Returns the backend's raw output; see
    /// [`GenerationParams::compose_result`](crate::GenerationParams::compose_result)
    /// for the displayed form.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::RequestFailed` with the backend's status and body if
    /// the request is rejected, or `DiroError::Http` on transport failure.
    pub async fn generate_once(&self, request: &GenerationRequest) -> Result<String> {
        let endpoint = "/api/generate";
        let response = self
            .http
            .post(self.url(endpoint))
            .json(request)
            .send()
            .await?;

        let body: GenerateResponse = check_request(response, endpoint).await?.json().await?;
        info!(material_type = %request.material_type, "Generated material in one request");
        Ok(body.output)
    }

    /// Grade labels offered by the backend.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::RequestFailed` or `DiroError::Http` if the list
    /// cannot be fetched.
    pub async fn fetch_grades(&self) -> Result<Vec<String>> {
        self.fetch_list("/api/grades").await
    }

    /// Material types offered by the backend.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::RequestFailed` or `DiroError::Http` if the list
    /// cannot be fetched.
    pub async fn fetch_material_types(&self) -> Result<Vec<String>> {
        self.fetch_list("/api/material_types").await
    }

    /// Difficulty levels offered by the backend.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::RequestFailed` or `DiroError::Http` if the list
    /// cannot be fetched.
    pub async fn fetch_difficulty_levels(&self) -> Result<Vec<String>> {
        self.fetch_list("/api/difficulty_levels").await
    }

    async fn fetch_list(&self, endpoint: &str) -> Result<Vec<String>> {
        let response = self
            .http
            .get(self.url(endpoint))
            .timeout(self.timeout)
            .send()
            .await?;
        let items: Vec<String> = check_request(response, endpoint).await?.json().await?;
        debug!(endpoint, count = items.len(), "Fetched catalogue");
        Ok(items)
    }

    /// Renders `text` to a document and returns the server-side file path.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::ExportFailed` with the backend's status and body if
    /// the export is rejected, or `DiroError::Http` on transport failure.
    pub async fn export(&self, text: &str, format: ExportFormat) -> Result<String> {
        let response = self
            .http
            .post(self.url("/api/export"))
            .timeout(self.timeout)
            .json(&ExportRequest {
                text: text.to_string(),
                filetype: format,
            })
            .send()
            .await?;

        let body: ExportResponse = check_status(response).await?.json().await?;
        info!(format = %format, file_path = %body.file_path, "Exported material");
        Ok(body.file_path)
    }

    /// The download URL for a server-side file reference.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::InvalidUrl` if the base URL cannot be parsed.
    pub fn download_url(&self, file_path: &str) -> Result<Url> {
        let endpoint = self.url("/api/download");
        Url::parse_with_params(&endpoint, [("file_path", file_path)])
            .map_err(|e| DiroError::invalid_url(endpoint, e.to_string()))
    }

    /// Downloads an exported file into `dest_dir` and returns the local path.
    ///
    /// The local file keeps only the final component of `file_path`.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::ExportFailed` if the backend rejects the download,
    /// `DiroError::Http` on transport failure, or `DiroError::Io` if the file
    /// cannot be written.
    pub async fn download(&self, file_path: &str, dest_dir: &Path) -> Result<PathBuf> {
        let url = self.download_url(file_path)?;
        let response = self.http.get(url).timeout(self.timeout).send().await?;
        let bytes = check_status(response).await?.bytes().await?;

        let file_name = Path::new(file_path)
            .file_name()
            .map_or_else(|| "diro-export".into(), ToOwned::to_owned);
        let destination = dest_dir.join(file_name);

        tokio::fs::create_dir_all(dest_dir).await?;
        tokio::fs::write(&destination, &bytes).await?;
        info!(path = %destination.display(), bytes = bytes.len(), "Downloaded export");
        Ok(destination)
    }
}

/// Turns a non-success response into `DiroError::ExportFailed`.
async fn check_status(response: Response) -> Result<Response> {
    match rejection(response).await {
        Ok(response) => Ok(response),
        Err((status, message)) => Err(DiroError::export_failed(status, message)),
    }
}

/// Turns a non-success response into `DiroError::RequestFailed`.
async fn check_request(response: Response, endpoint: &str) -> Result<Response> {
    match rejection(response).await {
        Ok(response) => Ok(response),
        Err((status, message)) => Err(DiroError::request_failed(endpoint, status, message)),
    }
}

/// Passes a success response through, or reads the status and body of a failure.
async fn rejection(response: Response) -> std::result::Result<Response, (u16, String)> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| status.to_string());
    Err((status.as_u16(), message))
}
