//! Request and response envelopes for each endpoint.

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentName};
use crate::event::Event;
use crate::message::Message;
use crate::run::{AwaitResume, Run, RunMode, SessionId};

/// `GET /ping` returns an empty object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {}

/// `GET /agents`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentsListResponse {
    pub agents: Vec<Agent>,
}

/// `GET /agents/{name}`
pub type AgentReadResponse = Agent;

/// `POST /runs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCreateRequest {
    pub agent_name: AgentName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub input: Vec<Message>,
    pub mode: RunMode,
}

pub type RunCreateResponse = Run;

/// `POST /runs/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResumeRequest {
    pub await_resume: AwaitResume,
    pub mode: RunMode,
}

pub type RunResumeResponse = Run;

/// `GET /runs/{id}`
pub type RunReadResponse = Run;

/// `POST /runs/{id}/cancel`
pub type RunCancelResponse = Run;

/// `GET /runs/{id}/events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEventsListResponse {
    pub events: Vec<Event>,
}
