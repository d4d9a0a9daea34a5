//! Error types for the harvest pipeline
//!
//! Only run-level problems are errors here. Per-field extraction misses are
//! `Option::None`, and exhausted fetches are reported as [`FetchFailure`]
//! values that the caller downgrades rather than propagates.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Error type for run-level harvest failures
#[derive(Error, Debug)]
pub enum HarvestError {
    /// HTTP client could not be built or used
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The listing could not be reached before any record was produced
    #[error("Listing unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Writing an export file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization or config decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize HarvestError as its display string
impl Serialize for HarvestError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Failure of a single network request, as seen by the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Request exceeded the client timeout
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Server answered with a non-2xx status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Server answered with a captcha or bot-challenge page
    #[error("challenge page returned")]
    Challenge,

    /// Any other transport failure
    #[error("network error: {0}")]
    Other(String),
}

impl NetworkError {
    /// True for responses that mean the site is refusing us.
    pub fn is_block_signal(&self) -> bool {
        matches!(self, NetworkError::Status(403 | 429) | NetworkError::Challenge)
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else if err.is_connect() {
            NetworkError::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            NetworkError::Status(status.as_u16())
        } else {
            NetworkError::Other(err.to_string())
        }
    }
}

/// A fetch whose retry budget ran out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("fetch of {url} failed after {attempts} attempt(s): {last_error}")]
pub struct FetchFailure {
    /// URL that could not be fetched
    pub url: String,
    /// Attempts made before giving up
    pub attempts: u32,
    /// Error from the final attempt
    pub last_error: NetworkError,
    /// Every attempt was a block signal (403, 429 or a challenge page)
    pub blocked: bool,
}

impl FetchFailure {
    /// Whether the failure should stop the whole run.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }
}
