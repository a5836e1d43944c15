// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session model: identity for one running agent container.
//!
//! Exactly one session exists per live container. Sessions are created by
//! the lifecycle manager at spawn and destroyed when the container is
//! confirmed removed; they never migrate between containers.

use serde::{Deserialize, Serialize};

use crate::id::{ConnectionIdentity, SessionId};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Starting,
    Running,
    ShuttingDown,
    Gone,
}

impl SessionState {
    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Running)
    }
}

/// Identity and bookkeeping for one running agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Logical routing label (e.g. "email"): selects which events this
    /// session handles and which pinned tools it may invoke.
    pub group: String,
    pub container_id: String,
    pub connection_identity: ConnectionIdentity,
    pub started_at_ms: u64,
    pub state: SessionState,
}

impl Session {
    pub fn new(
        group: impl Into<String>,
        container_id: impl Into<String>,
        connection_identity: ConnectionIdentity,
        started_at_ms: u64,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            group: group.into(),
            container_id: container_id.into(),
            connection_identity,
            started_at_ms,
            state: SessionState::Starting,
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
