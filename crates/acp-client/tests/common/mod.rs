//! In-process protocol server for the end-to-end tests.
//!
//! Implements just enough of the wire contract to drive the client through
//! every run mode.  Four canned agents are served:
//!
//! - `echo` -- returns every input message.
//! - `slow_echo` -- like `echo`, but pauses before each message.
//! - `awaiter` -- pauses for input, then answers `"empty"` on resume.
//! - `failer` -- fails with `invalid_input`.
//!
//! Runs created with a session id see the session's earlier input and output
//! ahead of their own input.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use acp_client::models::schema::{
    AgentsListResponse, RunCreateRequest, RunEventsListResponse, RunResumeRequest,
};
use acp_client::models::{
    Agent, AwaitRequest, ErrorCode, ErrorModel, Event, Message, MessagePart, Metadata, Role,
    Run, RunMode, RunStatus,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Delay before each `slow_echo` message.
pub const SLOW_STEP: Duration = Duration::from_millis(200);

/// Time a cancelling run takes to become cancelled when nothing is running.
const CANCEL_GRACE: Duration = Duration::from_millis(20);

const AGENTS: [(&str, &str); 4] = [
    ("echo", "Echoes every input message"),
    ("slow_echo", "Echoes every input message, slowly"),
    ("awaiter", "Asks for more input before answering"),
    ("failer", "Always fails"),
];

// ── server lifecycle ─────────────────────────────────────────────────────────

pub struct TestServer {
    pub base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Bind to 127.0.0.1:0 and serve the protocol until the returned value drops.
pub async fn start_test_server() -> TestServer {
    let app = Router::new()
        .route("/ping", get(ping))
        .route("/agents", get(list_agents))
        .route("/agents/{name}", get(read_agent))
        .route("/runs", post(create_run))
        .route("/runs/{run_id}", get(read_run).post(resume_run))
        .route("/runs/{run_id}/cancel", post(cancel_run))
        .route("/runs/{run_id}/events", get(list_events))
        .with_state(AppState::default());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to port 0");
    let addr: SocketAddr = listener.local_addr().expect("get local addr");
    let base_url = format!("http://127.0.0.1:{}", addr.port());

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    // Small yield so the listener is ready.
    tokio::time::sleep(Duration::from_millis(10)).await;

    TestServer { base_url, handle }
}

// ── state ────────────────────────────────────────────────────────────────────

type Sink = Option<mpsc::UnboundedSender<Event>>;

#[derive(Clone, Default)]
struct AppState(Arc<Mutex<Inner>>);

#[derive(Default)]
struct Inner {
    runs: HashMap<Uuid, RunRecord>,
    sessions: HashMap<Uuid, Vec<Message>>,
}

struct RunRecord {
    run: Run,
    /// What the agent sees: session history followed by the new input.
    input: Vec<Message>,
    /// The input of this request alone, appended to the session on success.
    new_input: Vec<Message>,
    events: Vec<Event>,
    cancel_requested: bool,
}

impl AppState {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.0.lock().expect("state lock poisoned")
    }

    fn snapshot(&self, run_id: Uuid) -> Option<Run> {
        self.lock().runs.get(&run_id).map(|r| r.run.clone())
    }

    /// Apply `f` to the run and publish the events it returns.
    ///
    /// Returns `false`, after finishing the cancellation, when a cancel was
    /// requested before this step.
    fn step(&self, run_id: Uuid, sink: &Sink, f: impl FnOnce(&mut Run) -> Vec<Event>) -> bool {
        let mut inner = self.lock();
        let Some(record) = inner.runs.get_mut(&run_id) else {
            return false;
        };
        if record.cancel_requested {
            drop(inner);
            self.finish_cancel(run_id, sink);
            return false;
        }
        for event in f(&mut record.run) {
            record.events.push(event.clone());
            if let Some(tx) = sink {
                let _ = tx.send(event);
            }
        }
        true
    }

    /// Move a cancelling run to `cancelled`.  The terminal event is logged
    /// once but always delivered to `sink`.
    fn finish_cancel(&self, run_id: Uuid, sink: &Sink) {
        let mut inner = self.lock();
        let Some(record) = inner.runs.get_mut(&run_id) else {
            return;
        };
        if record.run.status != RunStatus::Cancelled {
            record.run.status = RunStatus::Cancelled;
            record.run.finished_at = Some(Utc::now());
            record.events.push(Event::RunCancelled {
                run: record.run.clone(),
            });
        }
        if let Some(tx) = sink {
            let _ = tx.send(Event::RunCancelled {
                run: record.run.clone(),
            });
        }
    }

    fn record_history(&self, run_id: Uuid) {
        let mut inner = self.lock();
        let Some(record) = inner.runs.get(&run_id) else {
            return;
        };
        let Some(session_id) = record.run.session_id else {
            return;
        };
        let mut turn = record.new_input.clone();
        turn.extend(record.run.output.iter().cloned());
        inner.sessions.entry(session_id).or_default().extend(turn);
    }
}

// ── agent execution ──────────────────────────────────────────────────────────

async fn execute(state: AppState, run_id: Uuid, sink: Sink, resumed: bool) {
    if !resumed
        && !state.step(run_id, &sink, |run| {
            run.status = RunStatus::InProgress;
            vec![Event::RunInProgress { run: run.clone() }]
        })
    {
        return;
    }

    let Some((agent_name, input)) = state
        .lock()
        .runs
        .get(&run_id)
        .map(|r| (r.run.agent_name.clone(), r.input.clone()))
    else {
        return;
    };
    let role = Role::agent_named(&agent_name).expect("agent names are valid roles");

    let output = match (agent_name.as_str(), resumed) {
        ("awaiter", false) => {
            state.step(run_id, &sink, |run| {
                run.status = RunStatus::Awaiting;
                run.await_request = Some(AwaitRequest::Message {
                    message: Message::agent(Vec::new()),
                });
                vec![Event::RunAwaiting { run: run.clone() }]
            });
            return;
        }
        ("awaiter", true) => vec![Message::new(role, vec![MessagePart::text("empty")])],
        ("failer", _) => {
            state.step(run_id, &sink, |run| {
                run.status = RunStatus::Failed;
                run.error = Some(ErrorModel::new(
                    ErrorCode::InvalidInput,
                    "Wrong question buddy!",
                ));
                run.finished_at = Some(Utc::now());
                vec![Event::RunFailed { run: run.clone() }]
            });
            return;
        }
        _ => input
            .into_iter()
            .map(|m| Message {
                role: role.clone(),
                ..m
            })
            .collect(),
    };

    let slow = agent_name == "slow_echo";
    for message in output {
        if slow {
            tokio::time::sleep(SLOW_STEP).await;
        }
        let emitted = state.step(run_id, &sink, |run| {
            run.output.push(message.clone());
            vec![
                Event::MessageCreated {
                    message: message.clone(),
                },
                Event::MessageCompleted { message },
            ]
        });
        if !emitted {
            return;
        }
    }

    let completed = state.step(run_id, &sink, |run| {
        run.status = RunStatus::Completed;
        run.finished_at = Some(Utc::now());
        vec![Event::RunCompleted { run: run.clone() }]
    });
    if completed {
        state.record_history(run_id);
    }
}

/// Answer a create or resume request in the requested mode.
async fn respond(
    state: AppState,
    run_id: Uuid,
    mode: RunMode,
    resumed: bool,
    sink: Sink,
    events: Option<mpsc::UnboundedReceiver<Event>>,
) -> Response {
    match (mode, events) {
        (RunMode::Stream, Some(rx)) => {
            tokio::spawn(execute(state, run_id, sink, resumed));
            let stream = futures::stream::unfold(rx, |mut rx| async move {
                let event = rx.recv().await?;
                let data = serde_json::to_string(&event).expect("event serializes");
                Some((Ok::<_, Infallible>(SseEvent::default().data(data)), rx))
            });
            Sse::new(stream).into_response()
        }
        (RunMode::Async, _) => {
            let run = state.snapshot(run_id).expect("run exists");
            tokio::spawn(execute(state, run_id, sink, resumed));
            Json(run).into_response()
        }
        _ => {
            execute(state.clone(), run_id, sink, resumed).await;
            Json(state.snapshot(run_id).expect("run exists")).into_response()
        }
    }
}

fn channel(mode: RunMode) -> (Sink, Option<mpsc::UnboundedReceiver<Event>>) {
    match mode {
        RunMode::Stream => {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        }
        _ => (None, None),
    }
}

// ── handlers ─────────────────────────────────────────────────────────────────

fn error(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorModel::new(code, message))).into_response()
}

fn run_not_found(run_id: Uuid) -> Response {
    error(
        StatusCode::NOT_FOUND,
        ErrorCode::NotFound,
        format!("Run {run_id} not found"),
    )
}

fn agent(name: &str) -> Option<Agent> {
    AGENTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(name, description)| Agent {
            name: (*name).to_owned(),
            description: Some((*description).to_owned()),
            metadata: Metadata::default(),
        })
}

async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({}))
}

async fn list_agents() -> Json<AgentsListResponse> {
    Json(AgentsListResponse {
        agents: AGENTS.iter().filter_map(|(name, _)| agent(name)).collect(),
    })
}

async fn read_agent(Path(name): Path<String>) -> Response {
    match agent(&name) {
        Some(agent) => Json(agent).into_response(),
        None => error(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            format!("Agent {name} not found"),
        ),
    }
}

async fn create_run(State(state): State<AppState>, Json(req): Json<RunCreateRequest>) -> Response {
    if agent(&req.agent_name).is_none() {
        return error(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            format!("Agent {} not found", req.agent_name),
        );
    }

    let mut run = Run::new(req.agent_name.clone());
    run.session_id = req.session_id;
    let run_id = run.run_id;

    {
        let mut inner = state.lock();
        let mut input = req
            .session_id
            .and_then(|id| inner.sessions.get(&id).cloned())
            .unwrap_or_default();
        input.extend(req.input.iter().cloned());
        inner.runs.insert(
            run_id,
            RunRecord {
                run,
                input,
                new_input: req.input,
                events: Vec::new(),
                cancel_requested: false,
            },
        );
    }

    let (sink, events) = channel(req.mode);
    state.step(run_id, &sink, |run| vec![Event::RunCreated { run: run.clone() }]);
    respond(state, run_id, req.mode, false, sink, events).await
}

async fn read_run(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Response {
    match state.snapshot(run_id) {
        Some(run) => Json(run).into_response(),
        None => run_not_found(run_id),
    }
}

async fn resume_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Json(req): Json<RunResumeRequest>,
) -> Response {
    match state.snapshot(run_id) {
        None => return run_not_found(run_id),
        Some(run) if run.status != RunStatus::Awaiting => {
            return error(
                StatusCode::CONFLICT,
                ErrorCode::InvalidInput,
                format!("Run {run_id} is {} and cannot be resumed", run.status),
            );
        }
        Some(_) => {}
    }

    let (sink, events) = channel(req.mode);
    state.step(run_id, &sink, |run| {
        run.status = RunStatus::InProgress;
        run.await_request = None;
        vec![Event::RunInProgress { run: run.clone() }]
    });
    respond(state, run_id, req.mode, true, sink, events).await
}

async fn cancel_run(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Response {
    let run = {
        let mut inner = state.lock();
        let Some(record) = inner.runs.get_mut(&run_id) else {
            return run_not_found(run_id);
        };
        if record.run.is_terminal() {
            return error(
                StatusCode::CONFLICT,
                ErrorCode::InvalidInput,
                format!("Run {run_id} is already {}", record.run.status),
            );
        }
        record.cancel_requested = true;
        record.run.status = RunStatus::Cancelling;
        record.run.clone()
    };

    let background = state.clone();
    tokio::spawn(async move {
        tokio::time::sleep(CANCEL_GRACE).await;
        background.finish_cancel(run_id, &None);
    });

    Json(run).into_response()
}

async fn list_events(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Response {
    match state.lock().runs.get(&run_id) {
        Some(record) => Json(RunEventsListResponse {
            events: record.events.clone(),
        })
        .into_response(),
        None => run_not_found(run_id),
    }
}
