//! Error types for fanout-dl
//!
//! Two layers of errors exist:
//! - [`FetchError`] is carried *inside* a pipeline result for a single item. It never
//!   stops the run and is never retried.
//! - [`Error`] is returned by run-level operations (configuration, telemetry sink,
//!   HTTP client construction).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fanout-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fanout-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "workers")
        key: Option<String>,
    },

    /// Telemetry log could not be opened
    #[error("failed to open telemetry log {path}: {source}")]
    TelemetryLog {
        /// Path of the log file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A spawned task panicked or was aborted
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Failure of a single fetch, carried as the error half of a pipeline result.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be constructed (malformed target)
    #[error("invalid request for {url}: {reason}")]
    InvalidRequest {
        /// The target that failed to parse
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Connection failure, timeout or cancellation before a response arrived
    #[error("transport error for {url}: {reason}")]
    Transport {
        /// Request target
        url: String,
        /// Transport failure description
        reason: String,
        /// Whether the per-request deadline expired
        timed_out: bool,
    },

    /// The server answered with something other than 200
    #[error("unexpected status {status} for {url}")]
    Status {
        /// Request target
        url: String,
        /// HTTP status code received
        status: u16,
    },

    /// The response body was not a valid record
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// Request target
        url: String,
        /// JSON decode error
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// The category this failure is counted under
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::InvalidRequest { .. } => FailureKind::InvalidRequest,
            FetchError::Transport { .. } => FailureKind::Transport,
            FetchError::Status { .. } => FailureKind::Status,
            FetchError::Decode { .. } => FailureKind::Decode,
        }
    }

    /// Target of the failed request
    pub fn url(&self) -> &str {
        match self {
            FetchError::InvalidRequest { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Decode { url, .. } => url,
        }
    }

    pub(crate) fn transport(url: &str, err: &reqwest::Error) -> Self {
        FetchError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }
}

/// Failure category, used for per-kind counters in the run summary
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Request-construction failure
    InvalidRequest,
    /// Connection failure or timeout
    Transport,
    /// Non-200 response
    Status,
    /// Malformed response body
    Decode,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_kinds_are_distinguishable() {
        let status = FetchError::Status {
            url: "http://x/photos/1".into(),
            status: 500,
        };
        assert_eq!(status.kind(), FailureKind::Status);
        assert_eq!(status.url(), "http://x/photos/1");
        assert_eq!(status.to_string(), "unexpected status 500 for http://x/photos/1");

        let decode = FetchError::Decode {
            url: "u".into(),
            source: serde_json::from_str::<u32>("nope").unwrap_err(),
        };
        assert_eq!(decode.kind(), FailureKind::Decode);
        assert!(std::error::Error::source(&decode).is_some());
    }

    #[test]
    fn config_error_keeps_key() {
        match Error::config("workers", "must be at least 1") {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("workers"));
                assert_eq!(message, "must be at least 1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
