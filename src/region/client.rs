//! HTTP client for a region's outbound calls
//!
//! Regions talk to the master (registration, sync pushes, relocation
//! notices) and to peer regions (user transfer). Every call is a single
//! attempt bounded by the configured timeout; callers decide whether a
//! failure is logged or surfaced.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::directory::{RegisterCityRequest, RelocationRequest, SyncRequest};
use crate::error::MessageResponse;
use crate::models::{Animal, RecordId};

use super::store::TransferBundle;

// ============================================================================
// Client Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Master base URL
    pub master_url: String,

    /// Applied to every request
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(master_url: impl Into<String>) -> Self {
        Self {
            master_url: master_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(crate::config::DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ============================================================================
// Upstream Client
// ============================================================================

/// Client for the master directory and peer regions
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    config: ClientConfig,
    http_client: Client,
}

impl UpstreamClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn master_url(&self) -> &str {
        &self.config.master_url
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Register (or re-register) the city with the master
    pub async fn register_city(&self, request: &RegisterCityRequest) -> Result<MessageResponse, ClientError> {
        let url = format!("{}/register", self.config.master_url);
        self.post_json(&url, request).await
    }

    /// Push the region's public data to the master
    pub async fn push_sync(&self, request: &SyncRequest) -> Result<MessageResponse, ClientError> {
        let url = format!("{}/sync", self.config.master_url);
        self.post_json(&url, request).await
    }

    /// Tell the master an animal moved to another city
    pub async fn notify_relocation(&self, id: RecordId, new_city: &str) -> Result<Animal, ClientError> {
        let url = format!("{}/updateCity", self.config.master_url);
        let request = RelocationRequest {
            id,
            new_city: new_city.to_string(),
        };
        self.post_json(&url, &request).await
    }

    /// Hand a user over to a peer region
    pub async fn send_transfer(
        &self,
        peer_url: &str,
        bundle: &TransferBundle,
    ) -> Result<MessageResponse, ClientError> {
        let url = format!("{}/transfer/receive", peer_url.trim_end_matches('/'));
        self.post_json(&url, bundle).await
    }

    async fn post_json<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<R, ClientError> {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::HttpError {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<R>().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout
            } else {
                ClientError::ParseError(e.to_string())
            }
        })
    }
}

// ============================================================================
// Client Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientError {
    /// Initialization error
    InitError(String),

    /// Connection refused, DNS failure, reset
    NetworkError(String),

    /// The call did not complete within the configured timeout
    Timeout,

    /// Non-2xx answer
    HttpError { status: u16, message: String },

    /// Body did not decode
    ParseError(String),
}

impl ClientError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::NetworkError(e.to_string())
        }
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitError(msg) => write!(f, "Initialization error: {msg}"),
            Self::NetworkError(msg) => write!(f, "Network error: {msg}"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::HttpError { status, message } => {
                write!(f, "HTTP error ({status}): {message}")
            }
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::new("http://localhost:3000/");

        assert_eq!(config.master_url, "http://localhost:3000");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_client_config_with_timeout() {
        let config = ClientConfig::new("http://localhost:3000").with_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_client_creation() {
        let client = UpstreamClient::new(ClientConfig::new("http://localhost:3000"));
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_error_display() {
        let err = ClientError::HttpError {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error (500): boom");
        assert_eq!(ClientError::Timeout.to_string(), "Request timed out");
    }
}
