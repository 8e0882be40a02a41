//! CLI entry point for the Agent Run protocol client.
//!
//! This binary provides the `acp` command with one subcommand per protocol
//! operation.  Records are printed to stdout as pretty JSON; logs go to
//! stderr.

mod cli;

use std::time::Duration;

use acp_client::models::{AwaitResume, Event, Message};
use acp_client::{Client, ClientConfig, EventStream};
use anyhow::{Context, Result, bail};
use clap::Parser;
use futures::StreamExt;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, GlobalArgs, Mode};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(if cli.global.verbose { "debug" } else { "warn" });

    let config = load_config(&cli.global)?;
    debug!(base_url = %config.base_url, session = ?config.session_id, "client configured");
    let client = Client::from_config(&config).context("failed to build client")?;

    match cli.command {
        Commands::Ping => {
            client.ping().await.context("ping failed")?;
            println!("ok");
            Ok(())
        }
        Commands::Agents => print_json(&client.agents().await?),
        Commands::Agent { name } => print_json(&client.agent(&name).await?),
        Commands::Run { agent, text, mode } => cmd_run(&client, &agent, text.join(" "), mode).await,
        Commands::Status { run_id } => print_json(&client.run_status(run_id).await?),
        Commands::Events { run_id } => print_json(&client.run_events(run_id).await?),
        Commands::Cancel { run_id } => print_json(&client.run_cancel(run_id).await?),
        Commands::Wait {
            run_id,
            interval_ms,
        } => {
            let run = client
                .wait_for_run(run_id, Duration::from_millis(interval_ms))
                .await?;
            print_json(&run)
        }
        Commands::Resume { run_id, text, mode } => {
            cmd_resume(&client, run_id, text.join(" "), mode).await
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: run / resume
// ---------------------------------------------------------------------------

async fn cmd_run(client: &Client, agent: &str, text: String, mode: Mode) -> Result<()> {
    match mode {
        Mode::Sync => print_json(&client.run_sync(agent, text).await?),
        Mode::Async => print_json(&client.run_async(agent, text).await?),
        Mode::Stream => print_stream(client.run_stream(agent, text).await?).await,
    }
}

async fn cmd_resume(client: &Client, run_id: uuid::Uuid, text: String, mode: Mode) -> Result<()> {
    let resume = AwaitResume::message(Message::user_text(text));
    match mode {
        Mode::Sync => print_json(&client.run_resume_sync(run_id, resume).await?),
        Mode::Async => print_json(&client.run_resume_async(run_id, resume).await?),
        Mode::Stream => print_stream(client.run_resume_stream(run_id, resume).await?).await,
    }
}

/// Print one line per event; a failed run ends the command with an error.
async fn print_stream(mut events: EventStream) -> Result<()> {
    while let Some(event) = events.next().await {
        let event = event.context("event stream failed")?;
        let kind = event.kind();

        match &event {
            Event::MessagePart { part } => {
                println!("{kind} {}", part.content().unwrap_or_default())
            }
            Event::MessageCreated { message } | Event::MessageCompleted { message } => {
                println!("{kind} {}", message.text())
            }
            Event::RunFailed { run } => {
                println!("{kind} {}", run.run_id);
                match &run.error {
                    Some(error) => bail!("run {} failed: {error}", run.run_id),
                    None => bail!("run {} failed", run.run_id),
                }
            }
            other => match other.run() {
                Some(run) => println!("{kind} {} {}", run.run_id, run.status),
                None => println!("{kind}"),
            },
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Defaults, then `--config`, then `ACP_*` variables, then flags.
fn load_config(args: &GlobalArgs) -> Result<ClientConfig> {
    let config = match &args.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ClientConfig::default(),
    };
    let mut config = config
        .apply_env()
        .context("invalid ACP_* environment variable")?;

    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(session) = args.session {
        config.session_id = Some(session);
    }
    Ok(config)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let formatted = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{formatted}");
    Ok(())
}

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
