//! Client for the Agent Run protocol.
//!
//! - [`client`] -- [`Client`], one method per protocol operation, sessions.
//! - [`stream`] -- [`EventStream`], typed events over a push response.
//! - [`sse`] -- the incremental `text/event-stream` record decoder.
//! - [`transport`] -- the HTTP seam and its reqwest implementation.
//! - [`config`] -- [`ClientConfig`] from TOML and `ACP_*` variables.
//! - [`error`] -- [`AcpError`], the single error type of this crate.
//!
//! The data model lives in `acp-models` and is re-exported as [`models`].

pub mod client;
pub mod config;
pub mod error;
pub mod sse;
pub mod stream;
pub mod transport;

pub use acp_models as models;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{AcpError, BoxError, HttpBody, ResponseHead, Result};
pub use sse::{SseDecoder, SseError, SseFault, SseRecord};
pub use stream::EventStream;
pub use transport::{BodyStream, HttpRequest, HttpResponse, ReqwestTransport, Transport};
