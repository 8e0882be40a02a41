//! Stream events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorModel;
use crate::message::{Message, MessagePart};
use crate::run::Run;

/// A single event pushed by the server while a run progresses.
///
/// The wire form is a JSON object discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "message.created")]
    MessageCreated { message: Message },
    #[serde(rename = "message.part")]
    MessagePart { part: MessagePart },
    #[serde(rename = "message.completed")]
    MessageCompleted { message: Message },
    #[serde(rename = "run.created")]
    RunCreated { run: Run },
    #[serde(rename = "run.in-progress")]
    RunInProgress { run: Run },
    #[serde(rename = "run.awaiting")]
    RunAwaiting { run: Run },
    #[serde(rename = "run.failed")]
    RunFailed { run: Run },
    #[serde(rename = "run.cancelled")]
    RunCancelled { run: Run },
    #[serde(rename = "run.completed")]
    RunCompleted { run: Run },
    #[serde(rename = "generic")]
    Generic { generic: Map<String, Value> },
    #[serde(rename = "error")]
    Error { error: ErrorModel },
}

impl Event {
    /// The wire value of the `type` discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "message.created",
            Self::MessagePart { .. } => "message.part",
            Self::MessageCompleted { .. } => "message.completed",
            Self::RunCreated { .. } => "run.created",
            Self::RunInProgress { .. } => "run.in-progress",
            Self::RunAwaiting { .. } => "run.awaiting",
            Self::RunFailed { .. } => "run.failed",
            Self::RunCancelled { .. } => "run.cancelled",
            Self::RunCompleted { .. } => "run.completed",
            Self::Generic { .. } => "generic",
            Self::Error { .. } => "error",
        }
    }

    /// The run carried by a run-lifecycle event.
    pub fn run(&self) -> Option<&Run> {
        match self {
            Self::RunCreated { run }
            | Self::RunInProgress { run }
            | Self::RunAwaiting { run }
            | Self::RunFailed { run }
            | Self::RunCancelled { run }
            | Self::RunCompleted { run } => Some(run),
            _ => None,
        }
    }

    /// The message carried by a message-created or message-completed event.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::MessageCreated { message } | Self::MessageCompleted { message } => Some(message),
            _ => None,
        }
    }
}
