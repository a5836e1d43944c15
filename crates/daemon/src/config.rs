// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration.
//!
//! Loaded from a TOML file by the CLI; every field has a default so a bare
//! `[groups]`-only config runs. Paths derive from the state and home
//! directories unless overridden.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::pipeline::RateLimitConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not determine state directory")]
    NoStateDir,
}

/// API-mode settings: agents expose an HTTP API on a named network instead
/// of the socket-mount request channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiModeConfig {
    /// Named container network (required for API mode).
    pub network: String,
    #[serde(default = "default_container_port")]
    pub container_port: u16,
    /// First host port; each spawn takes the next one.
    #[serde(default = "default_base_port")]
    pub base_port: u16,
}

fn default_container_port() -> u16 {
    8080
}

fn default_base_port() -> u16 {
    9300
}

/// Top-level supervisor configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Groups the supervisor will spawn agents for. Inbound messages for
    /// any other group are dropped.
    pub groups: Vec<String>,
    /// Max concurrent sessions per group.
    pub max_sessions_per_group: usize,
    /// Container engine: "docker" or "podman".
    pub engine: String,
    /// Agent container image.
    pub image: String,
    /// Container name prefix (`<prefix>-<group>-<rand>`).
    pub container_prefix: String,
    /// Graceful stop window before the forced kill, in milliseconds.
    pub graceful_stop_ms: u64,
    /// Confirmation wait for high-risk tools, in milliseconds.
    pub confirmation_wait_ms: u64,
    pub rate_limit: RateLimitConfig,
    /// State directory (sockets, lock file, audit log, breadcrumbs).
    pub state_dir: Option<PathBuf>,
    /// Home directory (plugins, credentials).
    pub home_dir: Option<PathBuf>,
    /// Optional host workspace mounted read-write at /workspace.
    pub workspace_dir: Option<PathBuf>,
    /// Optional read-only skills directory mounted at /skills.
    pub skills_dir: Option<PathBuf>,
    /// Optional per-group state root; `<root>/<group>` mounts at /state.
    pub group_state_dir: Option<PathBuf>,
    pub api_mode: Option<ApiModeConfig>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            max_sessions_per_group: 2,
            engine: "docker".to_string(),
            image: "carapace-agent:latest".to_string(),
            container_prefix: "cara".to_string(),
            graceful_stop_ms: 5_000,
            confirmation_wait_ms: 30_000,
            rate_limit: RateLimitConfig::default(),
            state_dir: None,
            home_dir: None,
            workspace_dir: None,
            skills_dir: None,
            group_state_dir: None,
            api_mode: None,
        }
    }
}

impl SupervisorConfig {
    /// Load from a TOML file.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn graceful_stop(&self) -> Duration {
        Duration::from_millis(self.graceful_stop_ms)
    }

    pub fn confirmation_wait(&self) -> Duration {
        Duration::from_millis(self.confirmation_wait_ms)
    }

    /// State directory, falling back to the environment resolution chain.
    pub fn resolved_state_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::env::state_dir().ok_or(ConfigError::NoStateDir),
        }
    }

    pub fn resolved_home_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.home_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::env::home_dir().ok_or(ConfigError::NoStateDir),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
