// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit record for rejected requests and dropped events.
//!
//! Entries are written by the dispatcher and the request pipeline and never
//! read back by the supervisor. Sinks must not fail the caller: a sink that
//! cannot write logs and drops the entry.

use serde::{Deserialize, Serialize};

/// Which stage produced the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditStage {
    Dispatch,
    Identity,
    Tool,
    Schema,
    Authorization,
    RateLimit,
    Confirmation,
    Handler,
}

/// Outcome recorded for the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditOutcome {
    Rejected,
    Dropped,
    Error,
}

/// One audit record.
///
/// For pipeline entries `topic` carries the tool name; for dispatcher
/// entries it carries the bus topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp_ms: u64,
    pub group: String,
    pub source: String,
    pub topic: String,
    pub correlation: String,
    pub stage: AuditStage,
    pub outcome: AuditOutcome,
    pub reason: String,
}

/// Append-only audit sink.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditEntry);
}

/// Sink that discards everything (for wiring without an audit file).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn append(&self, _entry: AuditEntry) {}
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
