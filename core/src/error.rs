//! Error types for the BagelDB client.
//!
//! # Design
//! The raw operations only fail locally (body serialization, reading a file)
//! or in the transport; remote 4xx/5xx statuses come back as responses. The
//! status-bearing variants are produced solely by the `parse_*` helpers and
//! `CollectionPages::items`, which decode bodies for callers who want them.

use thiserror::Error;

/// Errors returned by `BagelClient` and `BagelDb`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service returned 404 for the requested item.
    #[error("resource not found")]
    NotFound,

    /// A decode helper saw a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// No response was obtained (DNS, connect, TLS, timeout, reset).
    #[error("transport failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A local image file could not be read.
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A required configuration value was not provided.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(Box::new(err))
    }
}
