// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical container state snapshot.
//!
//! Each driver parses its engine's `inspect` output into this model.
//! Engine-specific zero values (the Go epoch timestamp, empty strings) are
//! translated to absent fields here so callers never see them.

use serde::{Deserialize, Serialize};

/// Canonical container status across engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
    Dead,
}

impl ContainerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }
}

/// Container health as reported by the engine's healthcheck, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    None,
    Starting,
    Healthy,
    Unhealthy,
}

/// Snapshot from `ContainerRuntime::inspect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerState {
    pub status: ContainerStatus,
    pub exit_code: Option<i64>,
    /// ISO-8601 start time, absent when the engine reports a zero value.
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub health: Option<HealthStatus>,
}

impl ContainerState {
    pub fn running() -> Self {
        Self {
            status: ContainerStatus::Running,
            exit_code: None,
            started_at: None,
            finished_at: None,
            health: None,
        }
    }

    pub fn stopped(exit_code: i64) -> Self {
        Self {
            status: ContainerStatus::Stopped,
            exit_code: Some(exit_code),
            started_at: None,
            finished_at: None,
            health: None,
        }
    }
}

/// Translate an engine timestamp to an optional ISO string.
///
/// Docker and Podman report the Go zero time (`0001-01-01T00:00:00Z`) for
/// containers that never started or never finished.
pub(crate) fn non_zero_timestamp(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() || raw.starts_with("0001-01-01") {
        return None;
    }
    Some(raw.to_string())
}

/// Parse an engine health string, shared by both drivers.
pub(crate) fn parse_health(raw: Option<&str>) -> Option<HealthStatus> {
    match raw?.to_ascii_lowercase().as_str() {
        "none" | "" => Some(HealthStatus::None),
        "starting" => Some(HealthStatus::Starting),
        "healthy" => Some(HealthStatus::Healthy),
        "unhealthy" => Some(HealthStatus::Unhealthy),
        _ => None,
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
