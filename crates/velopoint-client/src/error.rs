//! Client error types.

use std::collections::HashMap;

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (no response received).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server responded with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message from the server (or a generic fallback).
        message: String,
    },

    /// Credential missing, expired, or rejected (401/403).
    #[error("unauthorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status code (401 or 403).
        status: u16,
        /// Error message from the server.
        message: String,
    },

    /// Server-side field validation failure.
    #[error("validation failed")]
    Validation {
        /// Field name to list of messages for form display.
        fields: HashMap<String, Vec<String>>,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this error should trigger session teardown.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized { .. })
    }

    /// Check if this is a transport failure with no server response.
    pub fn is_network(&self) -> bool {
        match self {
            Error::Network(e) => !e.is_status(),
            _ => false,
        }
    }

    /// HTTP status code, when the server responded.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } | Error::Unauthorized { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// User-facing message: the server's text verbatim where available,
    /// otherwise `fallback`.
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            Error::Http { message, .. } | Error::Unauthorized { message, .. } => message.clone(),
            Error::Validation { fields } => fields
                .values()
                .flatten()
                .next()
                .cloned()
                .unwrap_or_else(|| fallback.to_string()),
            Error::Network(_) => "Network error. Please check your connection.".to_string(),
            _ => fallback.to_string(),
        }
    }

    /// User-facing message with a generic fallback.
    pub fn message(&self) -> String {
        self.message_or("An error occurred")
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
