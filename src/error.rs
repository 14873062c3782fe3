//! Error types for the PharmaMonitor client.

use std::path::Path;

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the PharmaMonitor client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required credential was missing.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// The API returned a non-success status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Network-level failure from the HTTP transport.
    #[error("network error: {0}")]
    Network(reqwest::Error),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// Token refresh failed; the session is no longer usable.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Failed to decode a response body.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Storage backend I/O failure.
    #[error("storage I/O error at {path}: {message}")]
    StorageIo { path: String, message: String },

    /// Storage (de)serialization failure.
    #[error("storage serialization error: {0}")]
    StorageSerialization(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a storage I/O error for a path.
    pub fn storage_io(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::StorageIo {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Classify a transport error, separating timeouts.
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e)
        }
    }

    /// True when the error is an HTTP 401 from the API.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }
}
