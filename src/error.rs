//! Error types for rawhistory
//!
//! Two families live here:
//! - `HistoryError`: anything that can go wrong while fetching one page of history.
//!   These never escape as HTTP statuses; the streaming engine embeds the message
//!   as the final element of the JSON array.
//! - `BuildError` / `ConfigError`: construction-time failures (builders, environment).
//!
//! Path decoding errors live in [`crate::decode`], HTTP-facing errors in [`crate::server`].

use thiserror::Error;

/// Failure of a single backend history fetch.
///
/// The `Display` output is exactly what ends up in the `{"error": ...}` element.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HistoryError {
    /// The request was cancelled before or during the fetch.
    #[error("request cancelled")]
    Cancelled,

    /// The backend could not be reached or the connection failed mid-response.
    #[error("transport error: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered, but reported a failure.
    #[error("{message}")]
    Backend {
        /// HTTP status reported by the backend, when there was one.
        status: Option<u16>,
        /// Backend-provided message.
        message: String,
    },

    /// The backend answered with a body that is not a valid history page.
    #[error("invalid backend response: {source}")]
    InvalidResponse {
        #[source]
        source: serde_json::Error,
    },

    /// A fetched event could not be serialized into the response.
    #[error("failed to encode history event: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

impl HistoryError {
    /// Backend-reported failure without an HTTP status.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            status: None,
            message: message.into(),
        }
    }

    /// Backend-reported failure carrying the HTTP status it came with.
    pub fn backend_status(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Whether this failure was caused by cancellation rather than the backend.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Builder validation failure.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("Missing required builder attribute: {0}")]
    MissingAttribute(&'static str),
}

/// Configuration or environment parsing failure.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Telemetry initialization error: {0}")]
    TelemetryInit(String),

    #[error("Failed to build HTTP client: {source}")]
    HttpClient {
        #[source]
        source: reqwest::Error,
    },
}
