// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host credential passthrough for agent containers.
//!
//! Agent containers run isolated from the host keychain and config files,
//! so the supervisor resolves the agent's API credential on the host at
//! spawn time and injects it as an environment variable. The value is never
//! logged and never written to disk.
//!
//! Resolution order:
//! 1. `CARAPACE_AGENT_TOKEN` env var
//! 2. `~/.carapace/credentials.json` → `agent.token`

use std::path::PathBuf;

/// Container-internal env var carrying the agent credential.
pub const AGENT_TOKEN_ENV: &str = "CARAPACE_AGENT_TOKEN";

/// Resolve the agent credential from the host environment.
///
/// Returns `None` when nothing is configured; the agent will run without
/// credentials and likely fail to authenticate upstream.
pub fn resolve() -> Option<String> {
    if let Ok(token) = std::env::var(AGENT_TOKEN_ENV) {
        if !token.is_empty() {
            return Some(token);
        }
    }
    read_credentials_file()
}

fn read_credentials_file() -> Option<String> {
    let path = carapace_home()?.join("credentials.json");
    let content = std::fs::read_to_string(&path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&content).ok()?;
    value
        .get("agent")
        .and_then(|v| v.get("token"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn carapace_home() -> Option<PathBuf> {
    crate::env::home_dir()
}
