// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire envelopes for the event bus and the request channel.
//!
//! Event bus messages are `EventEnvelope`s; tool invocations from agents are
//! `RequestEnvelope`s answered with `ResponseEnvelope`s. Identity fields an
//! agent puts on a request are deserialized but never trusted: the pipeline
//! overwrites them from the session registry before any stage reads them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Topic for inbound external messages (mail, chat, webhooks).
pub const TOPIC_MESSAGE_INBOUND: &str = "message.inbound";

/// Topic for scheduled task triggers.
pub const TOPIC_TASK_TRIGGERED: &str = "task.triggered";

/// An event published on the bus.
///
/// `topic`, `group`, `source` and `correlation` are constructed by trusted
/// publishers; `payload` is untrusted and schema-checked before it can cause
/// a spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub topic: String,
    pub group: String,
    pub source: String,
    pub correlation: String,
    #[serde(default)]
    pub payload: Value,
}

impl EventEnvelope {
    /// Whether this topic is one the supervisor may spawn agents for.
    pub fn is_spawn_topic(topic: &str) -> bool {
        topic == TOPIC_MESSAGE_INBOUND || topic == TOPIC_TASK_TRIGGERED
    }
}

/// A tool invocation received from a containerized agent.
///
/// `claimed_group` and `claimed_session` are whatever the agent wrote on the
/// wire. They exist only so the bytes parse; stage 1 discards them and
/// resolves identity from the connection, never from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(rename = "group", default, skip_serializing_if = "Option::is_none")]
    pub claimed_group: Option<String>,
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub claimed_session: Option<String>,
    #[serde(rename = "source", default, skip_serializing_if = "Option::is_none")]
    pub claimed_source: Option<String>,
}

impl RequestEnvelope {
    pub fn new(correlation_id: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            tool: tool.into(),
            arguments,
            claimed_group: None,
            claimed_session: None,
            claimed_source: None,
        }
    }
}

/// Stable error codes carried on rejected responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UnknownTool,
    ValidationFailed,
    Unauthorized,
    RateLimited,
    ConfirmationTimeout,
    HandlerError,
    PluginError,
}

/// Error detail on a rejected response.
///
/// `message` is short and human-readable; no stack traces or internal paths
/// cross this boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    pub retriable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorBody {
    pub fn unknown_tool(tool: &str) -> Self {
        Self {
            code: ErrorCode::UnknownTool,
            message: format!("unknown tool: {tool}"),
            retriable: false,
            retry_after: None,
            field: None,
        }
    }

    pub fn validation_failed(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            retriable: false,
            retry_after: None,
            field: Some(field.into()),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Unauthorized,
            message: message.into(),
            retriable: false,
            retry_after: None,
            field: None,
        }
    }

    pub fn rate_limited(retry_after: f64) -> Self {
        Self {
            code: ErrorCode::RateLimited,
            message: "rate limit exceeded".to_string(),
            retriable: true,
            retry_after: Some(retry_after),
            field: None,
        }
    }

    pub fn confirmation_timeout(tool: &str) -> Self {
        Self {
            code: ErrorCode::ConfirmationTimeout,
            message: format!("no confirmation received for high-risk tool: {tool}"),
            retriable: true,
            retry_after: None,
            field: None,
        }
    }

    pub fn handler_error(message: impl Into<String>, retriable: bool) -> Self {
        Self {
            code: ErrorCode::HandlerError,
            message: message.into(),
            retriable,
            retry_after: None,
            field: None,
        }
    }

    pub fn plugin_error(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::PluginError,
            message: message.into(),
            retriable: false,
            retry_after: None,
            field: None,
        }
    }
}

/// Reply to a request: `{ok: true, result}` or `{ok: false, error}`.
///
/// Construct through [`ResponseEnvelope::ok`] / [`ResponseEnvelope::err`] so
/// the `ok` flag and the populated side always agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ResponseEnvelope {
    pub fn ok(result: Value) -> Self {
        Self { ok: true, result: Some(result), error: None }
    }

    pub fn err(error: ErrorBody) -> Self {
        Self { ok: false, result: None, error: Some(error) }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
