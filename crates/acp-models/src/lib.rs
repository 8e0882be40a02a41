//! Data model for the Agent Run protocol.
//!
//! Everything that crosses the wire between a client and an agent server is
//! modelled here as an immutable, validated value:
//!
//! - [`message`] -- message parts, artifacts, messages, and the
//!   concatenate/compress operations used to fold streamed output.
//! - [`input`] -- normalization of flexible caller input into messages.
//! - [`run`] -- run records, the run status machine, await request/resume.
//! - [`event`] -- the tagged union of stream events.
//! - [`agent`] -- agent catalog records and their open metadata.
//! - [`schema`] -- request and response envelopes for each endpoint.
//! - [`validation`] -- the single entry point for checking wire payloads,
//!   plus type guards.
//! - [`error`] -- the protocol error payload and [`ModelError`].
//!
//! Validation happens inside `Deserialize`: a value of any of these types is
//! proof that its invariants held when it was constructed.

pub mod agent;
pub mod error;
pub mod event;
pub mod input;
pub mod message;
pub mod run;
pub mod schema;
pub mod validation;

// Re-export the most commonly used types at the crate root.
pub use agent::{
    Agent, AgentName, Author, Capability, Contributor, Dependency, DependencyType, Link,
    LinkType, Metadata, WebUrl,
};
pub use error::{ErrorCode, ErrorModel, ModelError, Result};
pub use event::Event;
pub use input::{Input, normalize_input};
pub use message::{
    Artifact, ContentEncoding, Message, MessagePart, Role, compress_message, concat_messages,
};
pub use run::{
    AwaitRequest, AwaitResume, Run, RunId, RunMode, RunStatus, SessionId, is_terminal_status,
};
pub use validation::{is_message, is_message_part};
