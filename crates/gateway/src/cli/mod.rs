pub mod client;
pub mod login;

use clap::{Parser, Subcommand};

/// blah-code — a local-first coding agent daemon.
#[derive(Debug, Parser)]
#[command(name = "blah-code", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the daemon (default when no subcommand is given).
    Serve,
    /// Send a prompt through the daemon and print the response.
    Run {
        /// The prompt to send.
        prompt: String,
        /// Session id; a new session is created when omitted.
        #[arg(long)]
        session: Option<String>,
        /// Model override.
        #[arg(long)]
        model: Option<String>,
    },
    /// Print a session's event log.
    Events {
        /// The session id.
        session_id: String,
    },
    /// Show daemon status.
    Status,
    /// Tail the daemon log.
    Logs {
        /// How many lines to fetch.
        #[arg(long, default_value_t = 100)]
        lines: usize,
    },
    /// List sessions.
    Sessions,
    /// Store an API key for the model provider.
    Login,
}
