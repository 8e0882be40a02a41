//! Run records and the run status machine.
//!
//! The client observes these transitions:
//!
//! ```text
//! created -> in-progress -> { awaiting, completed, failed, cancelling }
//! awaiting -> in-progress
//! cancelling -> cancelled
//! ```
//!
//! A status change is observed by fetching a new [`Run`]; records are never
//! mutated in place.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorCode, ErrorModel, ModelError, Result};
use crate::message::Message;

pub type RunId = Uuid;
pub type SessionId = Uuid;

// ---------------------------------------------------------------------------
// Status and mode
// ---------------------------------------------------------------------------

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    #[default]
    Created,
    InProgress,
    Awaiting,
    Cancelling,
    Cancelled,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::InProgress => "in-progress",
            Self::Awaiting => "awaiting",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `completed`, `cancelled`, and `failed` are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-function form of [`RunStatus::is_terminal`].
pub fn is_terminal_status(status: RunStatus) -> bool {
    status.is_terminal()
}

/// How the server should deliver the result of a create or resume request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Block until the run reaches a terminal or awaiting state.
    #[default]
    Sync,
    /// Return immediately; the caller polls.
    Async,
    /// Push events as they happen.
    Stream,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
            Self::Stream => "stream",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Await request / resume
// ---------------------------------------------------------------------------

/// What a paused run is waiting for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
#[non_exhaustive]
pub enum AwaitRequest {
    Message { message: Message },
}

/// The caller's answer to an [`AwaitRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
#[non_exhaustive]
pub enum AwaitResume {
    Message { message: Message },
}

impl AwaitResume {
    pub fn message(message: Message) -> Self {
        Self::Message { message }
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// One execution of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    pub agent_name: String,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default)]
    pub await_request: Option<AwaitRequest>,
    #[serde(default)]
    pub output: Vec<Message>,
    #[serde(default)]
    pub error: Option<ErrorModel>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    /// A freshly created run with no output.
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            agent_name: agent_name.into(),
            session_id: None,
            status: RunStatus::Created,
            await_request: None,
            output: Vec::new(),
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Turn a cancelled or failed run into an error.
    ///
    /// Any other status returns the run unchanged.  A failed run without an
    /// error payload yields a synthesized `server_error`.
    pub fn ensure_not_failed(self) -> Result<Run> {
        match self.status {
            RunStatus::Cancelled => Err(ModelError::RunCancelled {
                run_id: self.run_id,
            }),
            RunStatus::Failed => Err(ModelError::RunFailed {
                run_id: self.run_id,
                error: self.error.unwrap_or_else(|| {
                    ErrorModel::new(
                        ErrorCode::ServerError,
                        "run failed without an error payload",
                    )
                }),
            }),
            _ => Ok(self),
        }
    }
}
