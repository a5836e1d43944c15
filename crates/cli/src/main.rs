// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! carapace: operator CLI for the supervisor.

mod commands;
mod exit_error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "carapace", about = "Supervisor for sandboxed agent containers", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the supervisor in the foreground
    Start {
        /// Path to the TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Signal a running supervisor to shut down
    Stop,
    /// Show the running supervisor's sessions
    Status,
    /// Grant a single-use pre-approval for a high-risk tool call
    Approve {
        /// Correlation id of the pending (or imminent) request
        correlation_id: String,
    },
    /// Re-discover installed plugins in the running supervisor
    Reload,
    /// Gracefully stop one agent session
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Manage plugins
    Plugin {
        #[command(subcommand)]
        command: PluginCommand,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Stop a session by id
    Stop { session_id: String },
}

#[derive(Subcommand)]
enum PluginCommand {
    /// Install a plugin from a git URL
    Install {
        url: String,
        /// Override the URL-derived plugin name
        #[arg(long)]
        name: Option<String>,
    },
    /// List installed plugins
    List {
        /// Include built-in plugins
        #[arg(long)]
        builtin: bool,
    },
    /// Remove an installed plugin
    Remove {
        name: String,
        /// Also remove the plugin's credential directory
        #[arg(long)]
        credentials: bool,
    },
    /// Update a git-backed plugin to the remote default branch
    Update { name: String },
    /// Set one configuration key (value is parsed as JSON)
    Configure { name: String, key: String, value: String },
    /// Check a plugin's credentials and run its smoke test
    Verify { name: String },
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start { config } => commands::daemon::start(config).await,
        Command::Stop => commands::daemon::stop(),
        Command::Status => commands::daemon::status().await,
        Command::Approve { correlation_id } => commands::daemon::approve(&correlation_id).await,
        Command::Reload => commands::daemon::reload().await,
        Command::Session { command } => match command {
            SessionCommand::Stop { session_id } => {
                commands::daemon::session_stop(&session_id).await
            }
        },
        Command::Plugin { command } => commands::plugin::run(command).await,
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("carapace: {e}");
            std::process::ExitCode::from(e.code)
        }
    }
}
