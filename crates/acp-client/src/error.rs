//! Client error types.
//!
//! Every fallible client operation returns [`AcpError`].  Variants that saw a
//! response carry its [`ResponseHead`] so callers can inspect the status and
//! headers that came back.

use std::fmt;

use acp_models::{ErrorCode, ErrorModel, ModelError};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::Value;

/// Boxed cause carried by transport and stream failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Status line and headers of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        Self { status, headers }
    }

    /// The `content-type` header, if present and valid ASCII.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Body of an error response that was not a protocol error payload.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    Json(Value),
    Text(String),
}

impl fmt::Display for HttpBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Unified error type for the protocol client.
#[derive(Debug, thiserror::Error)]
pub enum AcpError {
    // -- Validation ----------------------------------------------------------
    /// Local input or a server payload did not match the data model.
    #[error("validation error: {0}")]
    Validation(#[source] ModelError),

    // -- Transport -----------------------------------------------------------
    /// The network call could not complete, or a success body was unusable.
    #[error("transport error: {reason}")]
    Transport {
        reason: String,
        head: Option<ResponseHead>,
        #[source]
        source: Option<BoxError>,
    },

    /// A non-2xx response whose body is not a protocol error payload.
    #[error("http error: status {}: {body}", .head.status)]
    Http { head: ResponseHead, body: HttpBody },

    // -- Protocol ------------------------------------------------------------
    /// The server reported a structured `{code, message}` error.
    #[error("protocol error: {error}")]
    Protocol { error: ErrorModel },

    // -- Streaming -----------------------------------------------------------
    /// The event stream could not be opened or broke mid-way.
    #[error("stream error: {reason}")]
    Stream {
        reason: String,
        head: Option<ResponseHead>,
        #[source]
        source: Option<BoxError>,
    },

    // -- Cancellation --------------------------------------------------------
    /// The run was cancelled or the request was aborted.
    #[error("cancelled: {reason}")]
    Cancelled { reason: String },

    // -- Configuration -------------------------------------------------------
    /// Client configuration could not be loaded or is invalid.
    #[error("config error: {reason}")]
    Config { reason: String },
}

/// Convenience alias used throughout the client crate.
pub type Result<T> = std::result::Result<T, AcpError>;

impl AcpError {
    /// The protocol error code, for [`AcpError::Protocol`] only.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Protocol { error } => Some(error.code),
            _ => None,
        }
    }

    /// Whether retrying the same request might succeed.
    ///
    /// Only `server_error` protocol failures qualify.  The client itself
    /// never retries.
    pub fn is_retryable(&self) -> bool {
        self.code() == Some(ErrorCode::ServerError)
    }

    /// The response head, when the failure happened after one was received.
    pub fn head(&self) -> Option<&ResponseHead> {
        match self {
            Self::Http { head, .. } => Some(head),
            Self::Transport { head, .. } | Self::Stream { head, .. } => head.as_ref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.head().map(|h| h.status)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub(crate) fn transport(
        reason: impl Into<String>,
        head: Option<ResponseHead>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Transport {
            reason: reason.into(),
            head,
            source: Some(source.into()),
        }
    }

    pub(crate) fn stream(reason: impl Into<String>, head: ResponseHead) -> Self {
        Self::Stream {
            reason: reason.into(),
            head: Some(head),
            source: None,
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

impl From<ModelError> for AcpError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::RunCancelled { run_id } => Self::Cancelled {
                reason: format!("run {run_id} has been cancelled"),
            },
            ModelError::RunFailed { error, .. } => Self::Protocol { error },
            other => Self::Validation(other),
        }
    }
}

impl From<serde_json::Error> for AcpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(ModelError::Json(err))
    }
}

impl From<reqwest::Error> for AcpError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            reason: err.to_string(),
            head: None,
            source: Some(Box::new(err)),
        }
    }
}
