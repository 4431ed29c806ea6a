//! Error types for the request builder and executor.
//!
//! # Design
//! Configuration failures are recorded once on the builder and surfaced only
//! when a terminal call runs, so `RequestError::Configuration` carries the
//! name of the call that failed alongside the underlying `ConfigError`.
//! Transport, status and decoding failures are produced by the executor and
//! never overlap with configuration failures.

use thiserror::Error;

use crate::flatten::FlattenError;

/// Coarse classification of a `RequestError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request could not be assembled; nothing was sent.
    Configuration,
    /// Resolution, connection, timeout or body-read failure, or the
    /// background worker for an asynchronous call could not start.
    Transport,
    /// The server answered with a status other than 200.
    Protocol,
    /// A 200 response body could not be decoded into the requested form.
    Decoding,
}

/// Errors returned by terminal operations on `RequestBuilder`.
#[derive(Debug, Error)]
pub enum RequestError {
    /// A configuration call failed. The first failure wins and is reported
    /// verbatim by the terminal call.
    #[error("{stage}: {source}")]
    Configuration {
        stage: &'static str,
        #[source]
        source: ConfigError,
    },

    /// The network round-trip failed.
    #[error("transport failed: {0}")]
    Transport(#[source] ureq::Error),

    /// The server returned a non-200 status. The body is kept as diagnostic
    /// detail and is not parsed.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("decoding failed: {0}")]
    Decode(#[from] DecodeError),

    /// The background worker for an asynchronous call could not be started.
    #[error("failed to spawn request worker: {0}")]
    Spawn(#[source] std::io::Error),
}

impl RequestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RequestError::Configuration { .. } => ErrorKind::Configuration,
            RequestError::Transport(_) | RequestError::Spawn(_) => ErrorKind::Transport,
            RequestError::Status { .. } => ErrorKind::Protocol,
            RequestError::Decode(_) => ErrorKind::Decoding,
        }
    }
}

/// Reasons a configuration call can fail.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The URL template and its arguments disagree on the placeholder count.
    #[error("url template expects {expected} argument(s), got {actual}")]
    TemplateArity { expected: usize, actual: usize },

    /// The template has an unmatched `{` or `}`.
    #[error("url template is malformed: {0}")]
    Template(String),

    /// The substituted template is not a valid URL.
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Flatten(#[from] FlattenError),

    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),

    #[error("invalid value for header {0:?}")]
    InvalidHeaderValue(String),

    /// The JSON body could not be serialized.
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A multipart part could not be written.
    #[error("multipart write failed: {0}")]
    Multipart(String),
}

/// Failures decoding a successful response body.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("response body is not the expected JSON: {0}")]
    Json(#[from] serde_json::Error),
}
