// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! carapaced: the supervisor daemon binary.
//!
//! Usage: `carapaced [config.toml]`. The config path may also come from
//! `CARAPACE_CONFIG`. Runs in the foreground until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use carapace_daemon::{Supervisor, SupervisorConfig};
use carapace_runtime::{ContainerRuntime, DockerRuntime, PodmanRuntime};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(state_dir: Option<&std::path::Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match state_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "carapaced.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

fn config_path() -> Option<PathBuf> {
    std::env::args().nth(1).map(PathBuf::from).or_else(|| {
        std::env::var("CARAPACE_CONFIG").ok().map(PathBuf::from)
    })
}

fn load_config() -> Result<SupervisorConfig, String> {
    match config_path() {
        Some(path) => SupervisorConfig::load(&path).map_err(|e| e.to_string()),
        None => Ok(SupervisorConfig::default()),
    }
}

fn select_runtime(engine: &str) -> Result<Arc<dyn ContainerRuntime>, String> {
    match engine {
        "docker" => Ok(Arc::new(DockerRuntime::new())),
        "podman" => Ok(Arc::new(PodmanRuntime::new())),
        other => Err(format!("unknown container engine: {other}")),
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("carapaced: {e}");
            return std::process::ExitCode::from(2);
        }
    };

    let log_to_file = std::env::var_os("CARAPACE_LOG_STDERR").is_none();
    let state_dir = config.resolved_state_dir().ok();
    if let Some(ref dir) = state_dir {
        let _ = std::fs::create_dir_all(dir);
    }
    let _log_guard = init_tracing(if log_to_file { state_dir.as_deref() } else { None });

    let runtime = match select_runtime(&config.engine) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("{e}");
            return std::process::ExitCode::from(2);
        }
    };

    let supervisor = match Supervisor::start(config, runtime).await {
        Ok(supervisor) => supervisor,
        Err(e) => {
            error!(error = %e, "startup failed");
            return std::process::ExitCode::from(5);
        }
    };

    // READY line for process managers and the CLI.
    println!("READY");

    wait_for_signal().await;
    info!("signal received, shutting down");
    supervisor.shutdown().await;
    std::process::ExitCode::SUCCESS
}

async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            error!(error = %e, "cannot install SIGTERM handler");
            // Fall back to ctrl-c only.
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}
