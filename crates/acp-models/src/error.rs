//! Model error types and the protocol error payload.
//!
//! [`ErrorModel`] is the `{code, message}` body a server sends when a request
//! or a run fails.  [`ModelError`] is what this crate returns when a value
//! cannot be constructed or a run status guard trips.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Protocol error payload
// ---------------------------------------------------------------------------

/// Machine-readable class of a protocol-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The server failed while handling a valid request.
    ServerError,
    /// The request or the run input was rejected.
    InvalidInput,
    /// The referenced agent or run does not exist.
    NotFound,
}

impl ErrorCode {
    /// The wire representation of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerError => "server_error",
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured error reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorModel {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorModel {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

// ---------------------------------------------------------------------------
// ModelError
// ---------------------------------------------------------------------------

/// Error type for model construction, validation, and run status guards.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    // -- Validation ---------------------------------------------------------
    /// A value failed its schema or invariant checks.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// Two messages with different roles cannot be merged into one.
    #[error("message roles must match for concatenation (`{left}` vs `{right}`)")]
    RoleMismatch { left: String, right: String },

    /// A list input mixed strings, parts, and messages.
    #[error("list with mixed input kinds is not supported")]
    MixedInput,

    /// A payload was not syntactically valid JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Run status guard ---------------------------------------------------
    /// The run was cancelled.
    #[error("run {run_id} has been cancelled")]
    RunCancelled { run_id: Uuid },

    /// The run failed with the carried protocol error.
    #[error("run {run_id} failed: {error}")]
    RunFailed { run_id: Uuid, error: ErrorModel },
}

impl ModelError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the models crate.
pub type Result<T> = std::result::Result<T, ModelError>;
