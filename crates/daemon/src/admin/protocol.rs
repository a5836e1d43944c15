// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed requests and responses on the admin socket.

use carapace_core::SessionState;
use serde::{Deserialize, Serialize};

/// Request from the CLI to the running supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AdminRequest {
    /// Health check ping
    Ping,

    /// List sessions with their container states
    Status,

    /// Grant a single-use pre-approval for a high-risk tool call
    Approve { correlation_id: String },

    /// Gracefully shut down one session
    SessionStop { session_id: String },

    /// Re-discover installed plugins and swap the tool catalog
    ReloadPlugins,
}

/// One session row in a status reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub group: String,
    pub state: SessionState,
    pub started_at_ms: u64,
    /// Engine-reported container status, when the container still exists.
    pub container_status: Option<String>,
}

/// Reply to an [`AdminRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AdminResponse {
    Pong,

    Status { sessions: Vec<SessionStatus> },

    Approved { correlation_id: String },

    SessionStopped { stopped: bool },

    Reloaded { tools: usize },

    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_tagged_by_type() {
        let wire = serde_json::to_value(AdminRequest::Approve {
            correlation_id: "c-1".to_string(),
        })
        .unwrap();
        assert_eq!(wire["type"], "Approve");
        assert_eq!(wire["correlation_id"], "c-1");
    }

    #[test]
    fn responses_round_trip() {
        let response = AdminResponse::Status {
            sessions: vec![SessionStatus {
                session_id: "ses-x".to_string(),
                group: "email".to_string(),
                state: SessionState::Running,
                started_at_ms: 12,
                container_status: Some("running".to_string()),
            }],
        };
        let bytes = serde_json::to_vec(&response).unwrap();
        let back: AdminResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(response, back);
    }
}
