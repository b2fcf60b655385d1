//! Error types for the capability layer

use thiserror::Error;

/// Capability error types.
///
/// Every variant is treated the same way by the engine: the operation that
/// needed the capability falls back to its deterministic path. The taxonomy
/// exists so callers can log and surface the distinction.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("capability call timed out")]
    Timeout,

    #[error("capability rate limited")]
    RateLimited,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CapabilityError::Timeout
        } else {
            CapabilityError::Http(err)
        }
    }
}

impl CapabilityError {
    /// Map a non-success HTTP status to the matching variant.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => CapabilityError::Unavailable(message),
            429 => CapabilityError::RateLimited,
            408 | 504 => CapabilityError::Timeout,
            _ => CapabilityError::Api { status, message },
        }
    }
}

/// Result type alias for capability operations
pub type Result<T> = std::result::Result<T, CapabilityError>;
