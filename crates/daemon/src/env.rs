// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Resolve state directory: `CARAPACE_STATE_DIR` > `XDG_STATE_HOME/carapace`
/// > `~/.local/state/carapace`.
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("CARAPACE_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("carapace"));
    }
    std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".local/state/carapace"))
}

/// Resolve home directory for plugins and credentials:
/// `CARAPACE_HOME` > `~/.carapace`.
pub fn home_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("CARAPACE_HOME") {
        return Some(PathBuf::from(dir));
    }
    std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".carapace"))
}

/// Readiness poll interval for API-mode containers.
pub fn ready_poll_interval() -> Duration {
    std::env::var("CARAPACE_READY_POLL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(100))
}

/// Maximum readiness poll attempts for API-mode containers.
pub fn ready_poll_attempts() -> u32 {
    std::env::var("CARAPACE_READY_ATTEMPTS").ok().and_then(|s| s.parse().ok()).unwrap_or(150)
}
