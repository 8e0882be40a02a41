//! End-to-end tests: the real reqwest transport against an in-process server.

mod common;

use std::time::Duration;

use acp_client::models::{AwaitRequest, AwaitResume, ErrorCode, Event, Message, RunStatus};
use acp_client::{AcpError, Client};
use futures::StreamExt;

use common::{SLOW_STEP, TestServer, start_test_server};

// ── helpers ──────────────────────────────────────────────────────────────────

const POLL: Duration = Duration::from_millis(10);

async fn setup() -> (TestServer, Client) {
    let server = start_test_server().await;
    let client = Client::new(&server.base_url).expect("build client");
    (server, client)
}

async fn collect(stream: acp_client::EventStream) -> Vec<Event> {
    stream
        .map(|event| event.expect("stream event"))
        .collect()
        .await
}

fn kinds(events: &[Event]) -> Vec<&'static str> {
    events.iter().map(Event::kind).collect()
}

// ── discovery ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ping_succeeds() {
    let (_server, client) = setup().await;
    client.ping().await.unwrap();
}

#[tokio::test]
async fn base_url_trailing_slash_is_ignored() {
    let server = start_test_server().await;
    let client = Client::new(format!("{}/", server.base_url)).unwrap();
    client.ping().await.unwrap();
}

#[tokio::test]
async fn lists_agents() {
    let (_server, client) = setup().await;
    let agents = client.agents().await.unwrap();
    let names: Vec<_> = agents.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["echo", "slow_echo", "awaiter", "failer"]);
}

#[tokio::test]
async fn reads_agent() {
    let (_server, client) = setup().await;
    let agent = client.agent("echo").await.unwrap();
    assert_eq!(agent.name, "echo");
    assert!(agent.description.is_some());
}

#[tokio::test]
async fn unknown_agent_is_protocol_not_found() {
    let (_server, client) = setup().await;
    match client.agent("nobody").await.unwrap_err() {
        AcpError::Protocol { error } => assert_eq!(error.code, ErrorCode::NotFound),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unknown_run_is_protocol_not_found() {
    let (_server, client) = setup().await;
    let err = client.run_status(uuid::Uuid::now_v7()).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NotFound));
    assert!(err.status().is_none());
}

// ── runs ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_echo() {
    let (_server, client) = setup().await;
    let run = client.run_sync("echo", "Hello!").await.unwrap();

    assert_eq!(run.agent_name, "echo");
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.finished_at.is_some());
    assert_eq!(run.output.len(), 1);

    let part = &run.output[0].parts[0];
    assert_eq!(part.content(), Some("Hello!"));
    assert_eq!(part.content_type(), "text/plain");
}

#[tokio::test]
async fn async_run_starts_created_and_completes() {
    let (_server, client) = setup().await;
    let run = client.run_async("echo", "Hello!").await.unwrap();
    assert_eq!(run.status, RunStatus::Created);

    let done = client.wait_for_run(run.run_id, POLL).await.unwrap();
    assert_eq!(done.status, RunStatus::Completed);
    assert_eq!(done.output[0].text(), "Hello!");
}

#[tokio::test]
async fn async_run_can_be_polled() {
    let (_server, client) = setup().await;
    let run = client.run_async("echo", "Hello!").await.unwrap();

    let mut status = run.status;
    while matches!(status, RunStatus::Created | RunStatus::InProgress) {
        tokio::time::sleep(POLL).await;
        status = client.run_status(run.run_id).await.unwrap().status;
    }
    assert_eq!(status, RunStatus::Completed);
}

#[tokio::test]
async fn failing_agent() {
    let (_server, client) = setup().await;
    let run = client.run_sync("failer", "Hello!").await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);

    let error = run.error.clone().expect("failed run carries an error");
    assert_eq!(error.code, ErrorCode::InvalidInput);
    assert_eq!(error.message, "Wrong question buddy!");

    match run.ensure_not_failed().unwrap_err() {
        acp_client::models::ModelError::RunFailed { error, .. } => {
            assert_eq!(error.code, ErrorCode::InvalidInput)
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn wait_for_failed_run_is_protocol_error() {
    let (_server, client) = setup().await;
    let run = client.run_async("failer", "Hello!").await.unwrap();
    match client.wait_for_run(run.run_id, POLL).await.unwrap_err() {
        AcpError::Protocol { error } => assert_eq!(error.code, ErrorCode::InvalidInput),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn run_events_are_recorded() {
    let (_server, client) = setup().await;
    let run = client.run_sync("echo", "Hello!").await.unwrap();
    let events = client.run_events(run.run_id).await.unwrap();

    assert_eq!(
        kinds(&events),
        [
            "run.created",
            "run.in-progress",
            "message.created",
            "message.completed",
            "run.completed",
        ]
    );
}

// ── streaming ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_echo() {
    let (_server, client) = setup().await;
    let stream = client.run_stream("echo", "Hello!").await.unwrap();
    assert_eq!(
        stream.head().content_type().as_deref(),
        Some("text/event-stream")
    );

    let events = collect(stream).await;
    assert!(matches!(events.first(), Some(Event::RunCreated { .. })));
    match events.last() {
        Some(Event::RunCompleted { run }) => assert_eq!(run.output[0].text(), "Hello!"),
        other => panic!("unexpected last event: {other:?}"),
    }

    let messages: Vec<&Message> = events
        .iter()
        .filter_map(|e| match e {
            Event::MessageCompleted { message } => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn stream_of_unknown_agent_fails_before_streaming() {
    let (_server, client) = setup().await;
    match client.run_stream("nobody", "Hello!").await.unwrap_err() {
        AcpError::Protocol { error } => assert_eq!(error.code, ErrorCode::NotFound),
        other => panic!("unexpected error: {other:?}"),
    }
}

// ── cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_awaiting_run() {
    let (_server, client) = setup().await;
    let run = client.run_async("awaiter", "Hello!").await.unwrap();

    let cancelling = client.run_cancel(run.run_id).await.unwrap();
    assert_eq!(cancelling.status, RunStatus::Cancelling);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let run = client.run_status(run.run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
}

#[tokio::test]
async fn cancel_slow_run() {
    let (_server, client) = setup().await;
    let run = client
        .run_async("slow_echo", vec!["one", "two", "three"])
        .await
        .unwrap();

    let cancelling = client.run_cancel(run.run_id).await.unwrap();
    assert_eq!(cancelling.status, RunStatus::Cancelling);

    tokio::time::sleep(SLOW_STEP * 2).await;
    let run = client.wait_for_run(run.run_id, POLL).await;
    match run.unwrap_err() {
        AcpError::Cancelled { reason } => assert!(reason.contains("cancelled")),
        other => panic!("unexpected error: {other:?}"),
    }
    let run = client.run_status(cancelling.run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(run.output.len() < 3);
}

#[tokio::test]
async fn cancel_finished_run_is_rejected() {
    let (_server, client) = setup().await;
    let run = client.run_sync("echo", "Hello!").await.unwrap();
    let err = client.run_cancel(run.run_id).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidInput));
}

#[tokio::test]
async fn cancel_during_stream() {
    let (_server, client) = setup().await;
    let mut stream = client
        .run_stream("slow_echo", vec!["one", "two"])
        .await
        .unwrap();

    let mut last = None;
    while let Some(event) = stream.next().await {
        let event = event.unwrap();
        if let Event::RunCreated { run } = &event {
            let run = client.run_cancel(run.run_id).await.unwrap();
            assert_eq!(run.status, RunStatus::Cancelling);
        }
        last = Some(event);
    }
    assert!(matches!(last, Some(Event::RunCancelled { .. })));
    assert!(stream.is_done());
}

// ── await / resume ───────────────────────────────────────────────────────────

fn resume() -> AwaitResume {
    AwaitResume::message(Message::user_text("Here you go"))
}

#[tokio::test]
async fn awaiter_awaits() {
    let (_server, client) = setup().await;
    let run = client.run_sync("awaiter", "Hello!").await.unwrap();
    assert_eq!(run.status, RunStatus::Awaiting);
    match run.await_request {
        Some(AwaitRequest::Message { message }) => assert!(message.parts.is_empty()),
        other => panic!("unexpected await request: {other:?}"),
    }
}

#[tokio::test]
async fn resume_sync() {
    let (_server, client) = setup().await;
    let run = client.run_sync("awaiter", "Hello!").await.unwrap();

    let run = client.run_resume_sync(run.run_id, resume()).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.await_request.is_none());
    assert_eq!(run.output.last().map(Message::text).as_deref(), Some("empty"));
}

#[tokio::test]
async fn resume_async() {
    let (_server, client) = setup().await;
    let run = client.run_sync("awaiter", "Hello!").await.unwrap();

    let resumed = client.run_resume_async(run.run_id, resume()).await.unwrap();
    assert_eq!(resumed.status, RunStatus::InProgress);

    let done = client.wait_for_run(run.run_id, POLL).await.unwrap();
    assert_eq!(done.status, RunStatus::Completed);
}

#[tokio::test]
async fn resume_stream() {
    let (_server, client) = setup().await;
    let run = client.run_sync("awaiter", "Hello!").await.unwrap();

    let stream = client.run_resume_stream(run.run_id, resume()).await.unwrap();
    let events = collect(stream).await;
    assert!(matches!(events.first(), Some(Event::RunInProgress { .. })));
    assert!(matches!(events.last(), Some(Event::RunCompleted { .. })));
}

#[tokio::test]
async fn resume_of_completed_run_is_rejected() {
    let (_server, client) = setup().await;
    let run = client.run_sync("echo", "Hello!").await.unwrap();
    let err = client.run_resume_sync(run.run_id, resume()).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidInput));
}

// ── sessions ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_carries_history() {
    let (_server, client) = setup().await;
    let (first, second) = client
        .with_session(None, |session| async move {
            let first = session.run_sync("echo", "Hello!").await.unwrap();
            let second = session.run_sync("echo", "Hello again!").await.unwrap();
            (first, second)
        })
        .await;

    assert_eq!(first.session_id, second.session_id);
    assert!(first.session_id.is_some());
    assert_eq!(first.output.len(), 1);
    assert_eq!(second.output.len(), 3);
    assert_eq!(second.output[2].text(), "Hello again!");
}

#[tokio::test]
async fn runs_without_session_are_independent() {
    let (_server, client) = setup().await;
    client.run_sync("echo", "Hello!").await.unwrap();
    let run = client.run_sync("echo", "Hello!").await.unwrap();
    assert!(run.session_id.is_none());
    assert_eq!(run.output.len(), 1);
}
