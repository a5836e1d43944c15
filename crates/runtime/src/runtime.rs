// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The abstract container runtime contract.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RuntimeError;
use crate::options::RunOptions;
use crate::state::ContainerState;

/// Opaque handle to a container owned by the lifecycle manager.
///
/// Created by `run`; invalidated on successful `remove` or when orphan
/// cleanup observes the container is gone.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContainerHandle {
    /// Engine-assigned container id.
    pub id: String,
    /// Container name (engine-assigned if the caller supplied none).
    pub name: String,
    /// Which engine produced this handle (e.g. "docker", "podman").
    pub runtime_tag: String,
}

/// Uniform driver contract over local container engines.
///
/// Drivers translate options to engine CLI flags and parse engine-native
/// state into [`ContainerState`]. Everything engine-specific (SELinux
/// volume labels, rootless UID mapping, daemonless version formats) stays
/// behind this trait.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether the engine binary is present and responsive.
    async fn is_available(&self) -> bool;

    /// Engine version string.
    async fn version(&self) -> Result<String, RuntimeError>;

    async fn pull(&self, image: &str) -> Result<(), RuntimeError>;

    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError>;

    async fn load_image(&self, path: &Path) -> Result<(), RuntimeError>;

    /// Start a container. When `options.stdin_data` is present the driver
    /// must use the create-then-start pattern so the payload is piped on
    /// the container's stdin exactly once.
    async fn run(&self, options: &RunOptions) -> Result<ContainerHandle, RuntimeError>;

    /// Graceful stop with an optional engine-side timeout before the engine
    /// escalates to SIGKILL.
    async fn stop(&self, handle: &ContainerHandle, timeout: Option<Duration>) -> Result<(), RuntimeError>;

    async fn kill(&self, handle: &ContainerHandle) -> Result<(), RuntimeError>;

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError>;

    /// Snapshot the container state. Fails with `NotFound` if the container
    /// no longer exists.
    async fn inspect(&self, handle: &ContainerHandle) -> Result<ContainerState, RuntimeError>;

    /// Optional: build an image from a context directory.
    async fn build(&self, _context: &Path, _tag: &str) -> Result<(), RuntimeError> {
        Err(RuntimeError::Unsupported("build"))
    }

    /// Optional: read container labels.
    async fn inspect_labels(
        &self,
        _handle: &ContainerHandle,
    ) -> Result<HashMap<String, String>, RuntimeError> {
        Err(RuntimeError::Unsupported("inspect_labels"))
    }
}
