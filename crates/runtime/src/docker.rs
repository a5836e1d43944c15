// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker driver.
//!
//! Shells out to the `docker` CLI. State is read via
//! `docker inspect --format '{{json .State}}'` and mapped to the canonical
//! model; see `map_status` for the translation table.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::cli::{entrypoint_tail, run_engine, start_with_stdin, translate_run_flags, EngineFlavor};
use crate::error::RuntimeError;
use crate::options::RunOptions;
use crate::runtime::{ContainerHandle, ContainerRuntime};
use crate::state::{non_zero_timestamp, parse_health, ContainerState, ContainerStatus};

/// Driver for the Docker engine.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    bin: String,
}

impl DockerRuntime {
    pub fn new() -> Self {
        Self { bin: "docker".to_string() }
    }

    /// Override the engine binary (tests, alternate install paths).
    pub fn with_binary(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn handle(&self, id: String, options: &RunOptions) -> ContainerHandle {
        ContainerHandle {
            name: options.name.clone().unwrap_or_else(|| id.clone()),
            id,
            runtime_tag: "docker".to_string(),
        }
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn is_available(&self) -> bool {
        self.version().await.is_ok()
    }

    async fn version(&self) -> Result<String, RuntimeError> {
        let args = vec!["version".to_string(), "--format".to_string(), "{{.Server.Version}}".to_string()];
        run_engine(&self.bin, "version", &args, false).await
    }

    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        let args = vec!["pull".to_string(), image.to_string()];
        // Transient registry/network failures are worth retrying.
        run_engine(&self.bin, "pull", &args, true).await.map(|_| ())
    }

    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        let args = vec![
            "image".to_string(),
            "inspect".to_string(),
            image.to_string(),
            "--format".to_string(),
            "{{.Id}}".to_string(),
        ];
        match run_engine(&self.bin, "image_inspect", &args, false).await {
            Ok(_) => Ok(true),
            Err(RuntimeError::NotFound(_)) => Ok(false),
            Err(RuntimeError::CommandFailed { detail, .. })
                if detail.to_ascii_lowercase().contains("no such image") =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn load_image(&self, path: &Path) -> Result<(), RuntimeError> {
        let args = vec!["load".to_string(), "-i".to_string(), path.display().to_string()];
        run_engine(&self.bin, "load", &args, false).await.map(|_| ())
    }

    async fn run(&self, options: &RunOptions) -> Result<ContainerHandle, RuntimeError> {
        let flags = translate_run_flags(options, EngineFlavor::Docker);
        let tail = entrypoint_tail(options);

        if let Some(ref stdin_data) = options.stdin_data {
            // Create-then-start so the payload is piped exactly once.
            let mut args = vec!["create".to_string(), "-i".to_string()];
            args.extend(flags);
            args.push(options.image.clone());
            args.extend(tail);
            let id = run_engine(&self.bin, "create", &args, false).await?;
            let handle = self.handle(id, options);
            start_with_stdin(&self.bin, &handle.name, stdin_data).await?;
            return Ok(handle);
        }

        let mut args = vec!["run".to_string(), "-d".to_string()];
        args.extend(flags);
        args.push(options.image.clone());
        args.extend(tail);
        let id = run_engine(&self.bin, "run", &args, false).await?;
        Ok(self.handle(id, options))
    }

    async fn stop(&self, handle: &ContainerHandle, timeout: Option<Duration>) -> Result<(), RuntimeError> {
        let mut args = vec!["stop".to_string()];
        if let Some(timeout) = timeout {
            args.push("-t".to_string());
            args.push(timeout.as_secs().max(1).to_string());
        }
        args.push(handle.name.clone());
        run_engine(&self.bin, "stop", &args, false).await.map(|_| ())
    }

    async fn kill(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        let args = vec!["kill".to_string(), handle.name.clone()];
        run_engine(&self.bin, "kill", &args, false).await.map(|_| ())
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        let args = vec!["rm".to_string(), "-f".to_string(), handle.name.clone()];
        run_engine(&self.bin, "rm", &args, false).await.map(|_| ())
    }

    async fn inspect(&self, handle: &ContainerHandle) -> Result<ContainerState, RuntimeError> {
        let args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{json .State}}".to_string(),
            handle.name.clone(),
        ];
        let raw = run_engine(&self.bin, "inspect", &args, false).await?;
        parse_state(&raw)
    }

    async fn build(&self, context: &Path, tag: &str) -> Result<(), RuntimeError> {
        let args = vec![
            "build".to_string(),
            "-t".to_string(),
            tag.to_string(),
            context.display().to_string(),
        ];
        run_engine(&self.bin, "build", &args, false).await.map(|_| ())
    }

    async fn inspect_labels(
        &self,
        handle: &ContainerHandle,
    ) -> Result<std::collections::HashMap<String, String>, RuntimeError> {
        let args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{json .Config.Labels}}".to_string(),
            handle.name.clone(),
        ];
        let raw = run_engine(&self.bin, "inspect", &args, false).await?;
        if raw == "null" {
            return Ok(std::collections::HashMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| RuntimeError::Parse(e.to_string()))
    }
}

/// Docker status → canonical status.
///
/// `paused` maps to `stopped`: a paused container does no work and the
/// supervisor never pauses containers itself, so anything paused is treated
/// as halted. Note Podman maps the same status differently.
fn map_status(raw: &str) -> Result<ContainerStatus, RuntimeError> {
    match raw {
        "created" => Ok(ContainerStatus::Created),
        "restarting" => Ok(ContainerStatus::Starting),
        "running" => Ok(ContainerStatus::Running),
        "removing" => Ok(ContainerStatus::Stopping),
        "paused" | "exited" => Ok(ContainerStatus::Stopped),
        "dead" => Ok(ContainerStatus::Dead),
        other => Err(RuntimeError::Parse(format!("unknown docker status: {other}"))),
    }
}

fn parse_state(raw: &str) -> Result<ContainerState, RuntimeError> {
    let json: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| RuntimeError::Parse(e.to_string()))?;

    let status_raw = json
        .get("Status")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RuntimeError::Parse("missing Status field".to_string()))?;
    let status = map_status(status_raw)?;

    // ExitCode is only meaningful once the container has finished.
    let exit_code = match status {
        ContainerStatus::Stopped | ContainerStatus::Dead => {
            json.get("ExitCode").and_then(|v| v.as_i64())
        }
        _ => None,
    };

    Ok(ContainerState {
        status,
        exit_code,
        started_at: non_zero_timestamp(json.get("StartedAt").and_then(|v| v.as_str())),
        finished_at: non_zero_timestamp(json.get("FinishedAt").and_then(|v| v.as_str())),
        health: parse_health(
            json.get("Health").and_then(|h| h.get("Status")).and_then(|v| v.as_str()),
        ),
    })
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
