mod cmd_approvals;
mod cmd_approve;
mod cmd_console;
mod cmd_deny;
mod cmd_login;
mod cmd_send;
mod cmd_status;
mod config;
#[cfg(feature = "tui")]
mod tui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vigil", version, about = "Operator console for a supervised autonomous agent")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Launch the interactive operator console
    Console {
        /// Review a reported incident on startup (verifies live status first)
        #[arg(long)]
        review_incident: bool,
    },
    /// Authenticate against the backend and store the session token
    Login,
    /// Send one command to the agent and stream the reply to stdout
    Send {
        /// Command text for the agent
        prompt: String,
    },
    /// Show the live system status snapshot
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List approval requests
    Approvals {
        /// Include resolved requests, not only PENDING
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Approve a pending request by id
    Approve {
        /// Request id
        id: String,
        /// Replace a reviewable script's content with this file before approving
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Deny a pending request by id
    Deny {
        /// Request id
        id: String,
    },
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::ConsoleConfig::load();

    match cli.cmd {
        Command::Console { review_incident } => cmd_console::execute(config, review_incident),
        Command::Login => runtime()?.block_on(cmd_login::execute(config)),
        Command::Send { prompt } => runtime()?.block_on(cmd_send::execute(config, &prompt)),
        Command::Status { json } => runtime()?.block_on(cmd_status::execute(config, json)),
        Command::Approvals { all, json } => {
            runtime()?.block_on(cmd_approvals::execute(config, all, json))
        }
        Command::Approve { id, file } => {
            runtime()?.block_on(cmd_approve::execute(config, &id, file.as_deref()))
        }
        Command::Deny { id } => runtime()?.block_on(cmd_deny::execute(config, &id)),
    }
}
