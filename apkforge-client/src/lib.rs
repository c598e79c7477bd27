//! APK Forge HTTP Client
//!
//! A small, type-safe client for the build orchestrator: submit a build,
//! follow its progress stream, download the finished package.
//!
//! # Example
//!
//! ```no_run
//! use apkforge_client::{BuildClient, BuildSubmission};
//! use apkforge_core::domain::build::ContentSource;
//!
//! # async fn example() -> apkforge_client::Result<()> {
//! let client = BuildClient::new("http://localhost:9741");
//!
//! let accepted = client
//!     .submit_build(BuildSubmission {
//!         app_id: "demo".to_string(),
//!         name: "Demo".to_string(),
//!         icon: std::fs::read("icon.png").unwrap_or_default(),
//!         source: ContentSource::Url("https://example.com".to_string()),
//!     })
//!     .await?;
//!
//! let last = client
//!     .stream_progress(accepted.build_id, |event| {
//!         println!("{}% {}", event.payload.progress, event.payload.message);
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod builds;
pub mod error;
mod progress;
pub mod sse;

// Re-export commonly used types
pub use builds::BuildSubmission;
pub use error::{ClientError, Result};
pub use sse::{SseFrame, SseParser};

use apkforge_core::dto::build::ErrorBody;
use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the orchestrator API
#[derive(Debug, Clone)]
pub struct BuildClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:9741")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl BuildClient {
    /// Create a new client
    ///
    /// # Example
    /// ```
    /// use apkforge_client::BuildClient;
    ///
    /// let client = BuildClient::new("http://localhost:9741/");
    /// assert_eq!(client.base_url(), "http://localhost:9741");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client with a custom HTTP client
    ///
    /// Do not set a total request timeout on clients used for progress
    /// streams; a build can run for many minutes.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = self.check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Turns a non-success response into [`ClientError::ApiError`]
    ///
    /// The message is taken from the `{"error": ...}` body when present.
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ErrorBody>(&error_text)
            .map(|body| body.error)
            .unwrap_or(error_text);

        Err(ClientError::api_error(status.as_u16(), message))
    }
}
