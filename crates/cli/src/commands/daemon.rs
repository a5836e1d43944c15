// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `start`, `stop`, `status`, and the admin-socket commands.

use std::path::PathBuf;
use std::sync::Arc;

use carapace_daemon::admin;
use carapace_daemon::{AdminRequest, AdminResponse, Supervisor, SupervisorConfig};
use carapace_runtime::{ContainerRuntime, DockerRuntime, PodmanRuntime};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::exit_error::ExitError;

/// Run the supervisor in the foreground until SIGINT/SIGTERM.
pub async fn start(config_path: Option<PathBuf>) -> Result<(), ExitError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match config_path {
        Some(path) => {
            SupervisorConfig::load(&path).map_err(|e| ExitError::new(2, e.to_string()))?
        }
        None => SupervisorConfig::default(),
    };

    let runtime: Arc<dyn ContainerRuntime> = match config.engine.as_str() {
        "docker" => Arc::new(DockerRuntime::new()),
        "podman" => Arc::new(PodmanRuntime::new()),
        other => return Err(ExitError::new(2, format!("unknown container engine: {other}"))),
    };

    let supervisor = Supervisor::start(config, runtime)
        .await
        .map_err(|e| ExitError::new(5, e.to_string()))?;
    println!("carapace supervisor running (ctrl-c to stop)");

    wait_for_signal().await;
    supervisor.shutdown().await;
    Ok(())
}

/// Signal the running supervisor via the pid recorded in its lock file.
pub fn stop() -> Result<(), ExitError> {
    let pid = running_pid()?
        .ok_or_else(|| ExitError::new(4, "no running supervisor found"))?;
    kill(Pid::from_raw(pid), Signal::SIGTERM)
        .map_err(|e| ExitError::new(5, format!("failed to signal pid {pid}: {e}")))?;
    println!("sent SIGTERM to supervisor (pid {pid})");
    Ok(())
}

pub async fn status() -> Result<(), ExitError> {
    let Some(pid) = running_pid()? else {
        println!("supervisor not running");
        return Ok(());
    };
    println!("supervisor running (pid {pid})");

    match admin_request(&AdminRequest::Status).await? {
        AdminResponse::Status { sessions } if sessions.is_empty() => {
            println!("no active sessions");
        }
        AdminResponse::Status { sessions } => {
            for session in sessions {
                println!(
                    "{}  {}  {:?}  container={}",
                    session.session_id,
                    session.group,
                    session.state,
                    session.container_status.as_deref().unwrap_or("gone"),
                );
            }
        }
        other => return Err(unexpected_reply(other)),
    }
    Ok(())
}

/// Grant a single-use pre-approval for one correlation id.
pub async fn approve(correlation_id: &str) -> Result<(), ExitError> {
    match admin_request(&AdminRequest::Approve { correlation_id: correlation_id.to_string() })
        .await?
    {
        AdminResponse::Approved { correlation_id } => {
            println!("approved {correlation_id} (single use)");
            Ok(())
        }
        other => Err(unexpected_reply(other)),
    }
}

/// Ask the running supervisor to re-discover installed plugins.
pub async fn reload() -> Result<(), ExitError> {
    match admin_request(&AdminRequest::ReloadPlugins).await? {
        AdminResponse::Reloaded { tools } => {
            println!("catalog reloaded ({tools} tools)");
            Ok(())
        }
        AdminResponse::Error { message } => Err(ExitError::new(2, message)),
        other => Err(unexpected_reply(other)),
    }
}

/// Gracefully stop one session.
pub async fn session_stop(session_id: &str) -> Result<(), ExitError> {
    match admin_request(&AdminRequest::SessionStop { session_id: session_id.to_string() }).await? {
        AdminResponse::SessionStopped { stopped: true } => {
            println!("stopped {session_id}");
            Ok(())
        }
        AdminResponse::SessionStopped { stopped: false } => {
            Err(ExitError::new(4, format!("no such session: {session_id}")))
        }
        other => Err(unexpected_reply(other)),
    }
}

async fn admin_request(request: &AdminRequest) -> Result<AdminResponse, ExitError> {
    let state_dir = carapace_daemon::env::state_dir()
        .ok_or_else(|| ExitError::new(1, "could not determine state directory"))?;
    let socket = state_dir.join("admin.sock");
    admin::request(&socket, request)
        .await
        .map_err(|e| ExitError::new(5, format!("cannot reach supervisor: {e}")))
}

fn unexpected_reply(reply: AdminResponse) -> ExitError {
    match reply {
        AdminResponse::Error { message } => ExitError::new(5, message),
        other => ExitError::new(1, format!("unexpected reply: {other:?}")),
    }
}

/// Pid from the lock file, if that process is still alive.
fn running_pid() -> Result<Option<i32>, ExitError> {
    let state_dir = carapace_daemon::env::state_dir()
        .ok_or_else(|| ExitError::new(1, "could not determine state directory"))?;
    let lock_path = state_dir.join("carapaced.lock");

    let raw = match std::fs::read_to_string(&lock_path) {
        Ok(raw) => raw,
        Err(_) => return Ok(None),
    };
    let Some(pid) = raw.trim().parse::<i32>().ok() else {
        return Ok(None);
    };

    // Probe liveness without sending a signal.
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => Ok(Some(pid)),
        Err(_) => Ok(None),
    }
}

async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
