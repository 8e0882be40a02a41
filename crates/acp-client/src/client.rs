//! The Agent Run protocol client.
//!
//! [`Client`] wraps a [`Transport`] and a base URL and exposes one method per
//! protocol operation.  Every response passes through the same funnel:
//!
//! 1. non-2xx: the body is read as text; if it is a `{code, message}`
//!    payload the call fails with [`AcpError::Protocol`], otherwise with
//!    [`AcpError::Http`] carrying the JSON or raw text;
//! 2. 2xx: the body must be JSON and must validate as the expected type.
//!
//! Streaming operations run the same funnel on the response head before
//! handing the body to [`EventStream`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use acp_models::schema::{
    AgentReadResponse, AgentsListResponse, PingResponse, RunCancelResponse, RunCreateRequest,
    RunCreateResponse, RunEventsListResponse, RunReadResponse, RunResumeRequest,
    RunResumeResponse,
};
use acp_models::{
    Agent, AwaitResume, ErrorModel, Event, Input, Run, RunId, RunMode, RunStatus, SessionId,
    normalize_input, validation,
};
use reqwest::header::{ACCEPT, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{AcpError, HttpBody, ResponseHead, Result};
use crate::stream::EventStream;
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Shared, immutable part of a client and all of its session children.
struct ClientInner {
    base_url: String,
    transport: Arc<dyn Transport>,
}

/// A handle to one protocol server.
///
/// Cloning is cheap.  A client bound to a session attaches its session id to
/// every run it creates; see [`Client::session`].
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
    session_id: Option<SessionId>,
}

impl Client {
    /// A client for `base_url` using the default reqwest transport.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let transport = ReqwestTransport::new(None)?;
        Ok(Self::with_transport(base_url, Arc::new(transport)))
    }

    /// A client for `base_url` sending requests through `transport`.
    pub fn with_transport(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let base_url = base_url.into();
        let base_url = match base_url.strip_suffix('/') {
            Some(stripped) => stripped.to_owned(),
            None => base_url,
        };
        Self {
            inner: Arc::new(ClientInner {
                base_url,
                transport,
            }),
            session_id: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.timeout())?;
        let mut client = Self::with_transport(&config.base_url, Arc::new(transport));
        client.session_id = config.session_id;
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    // -- Sessions -----------------------------------------------------------

    /// A child client bound to `session_id`, or to a fresh session.
    ///
    /// The child shares this client's transport and base URL.  `self` is
    /// left unchanged.
    pub fn session(&self, session_id: Option<SessionId>) -> Client {
        Client {
            inner: Arc::clone(&self.inner),
            session_id: Some(session_id.unwrap_or_else(Uuid::now_v7)),
        }
    }

    /// Run `f` with a session-bound child inside a `session` tracing span.
    pub async fn with_session<F, Fut, T>(&self, session_id: Option<SessionId>, f: F) -> T
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = T>,
    {
        let session_id = session_id.unwrap_or_else(Uuid::now_v7);
        let span = tracing::info_span!("session", acp.session = %session_id);
        f(self.session(Some(session_id))).instrument(span).await
    }

    // -- Discovery ----------------------------------------------------------

    pub async fn ping(&self) -> Result<()> {
        let _: PingResponse = self.request_json(HttpRequest::get(self.url("/ping"))).await?;
        Ok(())
    }

    pub async fn agents(&self) -> Result<Vec<Agent>> {
        let resp: AgentsListResponse = self
            .request_json(HttpRequest::get(self.url("/agents")))
            .await?;
        Ok(resp.agents)
    }

    pub async fn agent(&self, name: &str) -> Result<Agent> {
        let agent: AgentReadResponse = self
            .request_json(HttpRequest::get(self.url(&format!("/agents/{name}"))))
            .await?;
        Ok(agent)
    }

    // -- Runs ---------------------------------------------------------------

    /// Create a run and wait for it to finish or pause.
    pub async fn run_sync(&self, agent_name: &str, input: impl Into<Input>) -> Result<Run> {
        let request = self.create_request(agent_name, input, RunMode::Sync)?;
        let run: RunCreateResponse = self.request_json(request).await?;
        Ok(run)
    }

    /// Create a run and return as soon as the server has accepted it.
    pub async fn run_async(&self, agent_name: &str, input: impl Into<Input>) -> Result<Run> {
        let request = self.create_request(agent_name, input, RunMode::Async)?;
        let run: RunCreateResponse = self.request_json(request).await?;
        Ok(run)
    }

    /// Create a run and stream its events.
    pub async fn run_stream(
        &self,
        agent_name: &str,
        input: impl Into<Input>,
    ) -> Result<EventStream> {
        let request = self.create_request(agent_name, input, RunMode::Stream)?;
        self.open_stream(request).await
    }

    pub async fn run_status(&self, run_id: RunId) -> Result<Run> {
        let run: RunReadResponse = self
            .request_json(HttpRequest::get(self.url(&format!("/runs/{run_id}"))))
            .await?;
        Ok(run)
    }

    pub async fn run_events(&self, run_id: RunId) -> Result<Vec<Event>> {
        let resp: RunEventsListResponse = self
            .request_json(HttpRequest::get(
                self.url(&format!("/runs/{run_id}/events")),
            ))
            .await?;
        Ok(resp.events)
    }

    /// Request cancellation.  The returned run is usually `cancelling`.
    pub async fn run_cancel(&self, run_id: RunId) -> Result<Run> {
        let run: RunCancelResponse = self
            .request_json(HttpRequest::post(
                self.url(&format!("/runs/{run_id}/cancel")),
            ))
            .await?;
        Ok(run)
    }

    pub async fn run_resume_sync(&self, run_id: RunId, await_resume: AwaitResume) -> Result<Run> {
        let request = self.resume_request(run_id, await_resume, RunMode::Sync)?;
        let run: RunResumeResponse = self.request_json(request).await?;
        Ok(run)
    }

    pub async fn run_resume_async(
        &self,
        run_id: RunId,
        await_resume: AwaitResume,
    ) -> Result<Run> {
        let request = self.resume_request(run_id, await_resume, RunMode::Async)?;
        let run: RunResumeResponse = self.request_json(request).await?;
        Ok(run)
    }

    pub async fn run_resume_stream(
        &self,
        run_id: RunId,
        await_resume: AwaitResume,
    ) -> Result<EventStream> {
        let request = self.resume_request(run_id, await_resume, RunMode::Stream)?;
        self.open_stream(request).await
    }

    /// Poll until the run is terminal or awaiting input.
    ///
    /// A `failed` run becomes [`AcpError::Protocol`] and a `cancelled` run
    /// becomes [`AcpError::Cancelled`].  Errors from polling are returned
    /// immediately.
    pub async fn wait_for_run(&self, run_id: RunId, poll_interval: Duration) -> Result<Run> {
        loop {
            let run = self.run_status(run_id).await?;
            if run.is_terminal() || run.status == RunStatus::Awaiting {
                tracing::debug!(run_id = %run_id, status = %run.status, "run settled");
                return Ok(run.ensure_not_failed()?);
            }
            tracing::trace!(run_id = %run_id, status = %run.status, "run still active");
            tokio::time::sleep(poll_interval).await;
        }
    }

    // -- Request plumbing ---------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    fn create_request(
        &self,
        agent_name: &str,
        input: impl Into<Input>,
        mode: RunMode,
    ) -> Result<HttpRequest> {
        let body = RunCreateRequest {
            agent_name: agent_name.to_owned(),
            session_id: self.session_id,
            input: normalize_input(input)?,
            mode,
        };
        HttpRequest::post(self.url("/runs")).json(&body)
    }

    fn resume_request(
        &self,
        run_id: RunId,
        await_resume: AwaitResume,
        mode: RunMode,
    ) -> Result<HttpRequest> {
        let body = RunResumeRequest { await_resume, mode };
        HttpRequest::post(self.url(&format!("/runs/{run_id}"))).json(&body)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.inner.transport.send(request).await?;
        error_for_status(response).await
    }

    async fn request_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let response = self.send(request).await?;
        let head = response.head();
        let text = response.text().await?;

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            AcpError::transport("response body is not valid JSON", Some(head), e)
        })?;
        Ok(validation::parse(value)?)
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<EventStream> {
        let request = request.header(ACCEPT, HeaderValue::from_static("text/event-stream"));
        let response = self.send(request).await?;
        EventStream::connect(response)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .field("session_id", &self.session_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Error funnel
// ---------------------------------------------------------------------------

/// Pass 2xx responses through; turn anything else into a typed error.
async fn error_for_status(response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let head = response.head();
    let text = response.text().await?;
    Err(classify_error(head, text))
}

fn classify_error(head: ResponseHead, text: String) -> AcpError {
    let Ok(value) = serde_json::from_str::<Value>(&text) else {
        tracing::debug!(status = %head.status, "error response is not json");
        return AcpError::Http {
            head,
            body: HttpBody::Text(text),
        };
    };

    match serde_json::from_value::<ErrorModel>(value.clone()) {
        Ok(error) => {
            tracing::debug!(status = %head.status, code = %error.code, "protocol error response");
            AcpError::Protocol { error }
        }
        Err(_) => AcpError::Http {
            head,
            body: HttpBody::Json(value),
        },
    }
}
