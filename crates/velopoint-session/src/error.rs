//! Error types for session operations.

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying API call failed.
    #[error("auth request failed: {0}")]
    Client(#[from] velopoint_client::Error),

    /// Durable storage failed.
    #[error("vault error: {0}")]
    Vault(String),

    /// Persisted session could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
