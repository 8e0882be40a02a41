//! CLI argument definitions for `acp`.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use uuid::Uuid;

/// acp -- talk to agents over the Agent Run protocol.
#[derive(Debug, Parser)]
#[command(
    name = "acp",
    version,
    about = "acp -- Agent Run protocol client",
    long_about = "Discover agents on a server, start runs in sync, async, or streaming mode, \
                  and inspect, cancel, or resume them."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Server root URL.  Overrides `ACP_BASE_URL` and the config file.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Attach created runs to this session.
    #[arg(long, global = true)]
    pub session: Option<Uuid>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check that the server is reachable.
    Ping,

    /// List the agents the server offers.
    Agents,

    /// Show one agent's manifest.
    Agent {
        name: String,
    },

    /// Start a run with a text input.
    Run {
        /// Agent to run.
        agent: String,

        /// Input text; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        #[arg(long, value_enum, default_value_t = Mode::Sync)]
        mode: Mode,
    },

    /// Show a run's current state.
    Status {
        run_id: Uuid,
    },

    /// List the events a run has produced so far.
    Events {
        run_id: Uuid,
    },

    /// Request cancellation of a run.
    Cancel {
        run_id: Uuid,
    },

    /// Poll a run until it finishes or awaits input.
    Wait {
        run_id: Uuid,

        /// Delay between polls, in milliseconds.
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },

    /// Answer an awaiting run with a text message.
    Resume {
        run_id: Uuid,

        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        #[arg(long, value_enum, default_value_t = Mode::Sync)]
        mode: Mode,
    },
}

/// Delivery mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Sync,
    Async,
    Stream,
}
