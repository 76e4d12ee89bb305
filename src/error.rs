//! Unified error handling for the pawmatch crate
//!
//! Every fallible operation in the stores, the directory and the HTTP
//! layers returns [`Error`]. The variants follow the four failure classes the
//! servers distinguish:
//!
//! - [`Error::NotFound`] - unknown id or city, surfaced as 404
//! - [`Error::Validation`] - missing or malformed input, surfaced as 400
//! - [`Error::Conflict`] - the record is busy with another operation, 409
//! - [`Error::Upstream`] - master or peer unreachable, 502 when surfaced
//! - [`Error::Persistence`] - a durable write failed, 500
//!
//! Background and best-effort calls (registration, periodic sync, relocation
//! notices) log upstream errors instead of returning them.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pawmatch::error::{Error, ErrorCategory};
//!
//! fn report(err: &Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(category = ?err.category(), "transient failure: {err}");
//!     }
//! }
//! ```

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::region::client::ClientError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Unknown id, city or user
    NotFound,
    /// Missing or malformed input
    Validation,
    /// Record busy with a concurrent operation
    Conflict,
    /// Master or peer server unreachable
    Upstream,
    /// Durable storage errors
    Storage,
    /// Configuration errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::Upstream => "upstream",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the pawmatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// A record with the given id does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Request failed validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Another operation already holds the record
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Master or peer server could not be reached
    #[error("Upstream unavailable: {0}")]
    Upstream(#[from] ClientError),

    /// A durable write failed
    #[error("Failed to persist {collection}: {source}")]
    Persistence {
        collection: &'static str,
        #[source]
        source: io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a not-found error
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Check if this error is recoverable (a later attempt may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Upstream(_) => true,
            Self::Persistence { .. } => true, // disk full, permissions fixed later
            Self::Conflict(_) => true,
            Self::NotFound { .. }
            | Self::Validation(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Other(_) => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::Upstream(_) => ErrorCategory::Upstream,
            Self::Persistence { .. } | Self::Json(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other(_) => ErrorCategory::Other,
        }
    }

    /// HTTP status used when the error reaches a client
    pub fn status_code(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::Upstream => StatusCode::BAD_GATEWAY,
            ErrorCategory::Storage | ErrorCategory::Config | ErrorCategory::Other => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

/// `{message}` body shared by acknowledgements and error responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(category = self.category().label(), "Request failed: {}", self);
        } else {
            tracing::debug!(category = self.category().label(), "Request rejected: {}", self);
        }
        (status, Json(MessageResponse::new(self.to_string()))).into_response()
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
