// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared CLI plumbing for the Docker and Podman drivers.
//!
//! Both engines accept near-identical command lines; the differences
//! (volume label suffix, rootless user mapping) are captured by
//! [`EngineFlavor`] so flag translation stays in one place.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::RuntimeError;
use crate::options::RunOptions;

/// Engine-specific flag dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineFlavor {
    Docker,
    Podman,
}

impl EngineFlavor {
    /// Suffix for a volume flag: Podman needs the SELinux relabel (`Z`).
    fn volume_suffix(&self, readonly: bool) -> &'static str {
        match (self, readonly) {
            (EngineFlavor::Docker, true) => ":ro",
            (EngineFlavor::Docker, false) => "",
            (EngineFlavor::Podman, true) => ":ro,Z",
            (EngineFlavor::Podman, false) => ":Z",
        }
    }
}

/// Translate [`RunOptions`] to engine CLI flags (everything between the
/// subcommand and the image). Pure so it can be tested without an engine.
pub(crate) fn translate_run_flags(options: &RunOptions, flavor: EngineFlavor) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(ref name) = options.name {
        args.push("--name".to_string());
        args.push(name.clone());
    }

    if options.read_only {
        args.push("--read-only".to_string());
    }

    // A named network wins over the disabled default.
    if let Some(ref network) = options.network {
        args.push("--network".to_string());
        args.push(network.clone());
    } else if options.network_disabled {
        args.push("--network".to_string());
        args.push("none".to_string());
    }

    for volume in &options.volumes {
        args.push("-v".to_string());
        args.push(format!(
            "{}:{}{}",
            volume.source.display(),
            volume.target,
            flavor.volume_suffix(volume.readonly)
        ));
    }

    for socket in &options.socket_mounts {
        args.push("-v".to_string());
        args.push(format!("{}:{}", socket.host_path.display(), socket.container_path));
    }

    for (key, value) in &options.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }

    if let Some(ref user) = options.user {
        args.push("--user".to_string());
        args.push(user.clone());
    } else if flavor == EngineFlavor::Podman {
        // Rootless Podman: keep the invoking UID inside the user namespace
        // so mounted sockets stay accessible.
        args.push("--userns=keep-id".to_string());
    }

    for mapping in &options.port_mappings {
        args.push("-p".to_string());
        args.push(format!("{}:{}", mapping.host, mapping.container));
    }

    if let Some(ref entrypoint) = options.entrypoint {
        if let Some(first) = entrypoint.first() {
            args.push("--entrypoint".to_string());
            args.push(first.clone());
        }
    }

    args
}

/// Arguments placed after the image: entrypoint tail, if any.
pub(crate) fn entrypoint_tail(options: &RunOptions) -> Vec<String> {
    options
        .entrypoint
        .as_ref()
        .map(|e| e.iter().skip(1).cloned().collect())
        .unwrap_or_default()
}

/// Run an engine CLI command and return trimmed stdout on success.
///
/// "No such container/object" failures are mapped to `NotFound` so callers
/// can distinguish a gone container from a broken engine.
pub(crate) async fn run_engine(
    bin: &str,
    op: &'static str,
    args: &[String],
    retriable: bool,
) -> Result<String, RuntimeError> {
    let output = Command::new(bin)
        .args(args)
        .output()
        .await
        .map_err(|e| RuntimeError::Unavailable(format!("failed to exec {bin}: {e}")))?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if is_not_found(&stderr) {
        return Err(RuntimeError::NotFound(stderr));
    }
    Err(RuntimeError::CommandFailed { op, detail: stderr, retriable })
}

fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("no such container")
        || lower.contains("no such object")
        || lower.contains("no container with name or id")
}

/// Create-then-start: create the container, then attach and pipe
/// `stdin_data` on its stdin exactly once. The payload never touches a file
/// or an environment variable.
pub(crate) async fn start_with_stdin(
    bin: &str,
    container: &str,
    stdin_data: &[u8],
) -> Result<(), RuntimeError> {
    let mut child = Command::new(bin)
        .args(["start", "--interactive", "--attach", container])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RuntimeError::Unavailable(format!("failed to exec {bin}: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(stdin_data)
            .await
            .map_err(|e| RuntimeError::CommandFailed {
                op: "start",
                detail: format!("writing stdin payload: {e}"),
                retriable: false,
            })?;
        // Drop closes the pipe so the container sees EOF.
    }

    // The attached process lives as long as the container; give it a moment
    // to consume the payload, then detach by dropping the child. Killing it
    // here would stop the container.
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
