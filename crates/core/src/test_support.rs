// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::audit::{AuditEntry, AuditSink};
use crate::envelope::{EventEnvelope, RequestEnvelope, TOPIC_MESSAGE_INBOUND};
use crate::id::ConnectionIdentity;
use crate::session::Session;

// ── Envelope factories ──────────────────────────────────────────────────

pub fn inbound_message_event(group: &str, text: &str) -> EventEnvelope {
    EventEnvelope {
        topic: TOPIC_MESSAGE_INBOUND.to_string(),
        group: group.to_string(),
        source: "test-bridge".to_string(),
        correlation: format!("corr-{group}"),
        payload: json!({"sender": "tester", "text": text}),
    }
}

pub fn tool_request(correlation: &str, tool: &str, arguments: Value) -> RequestEnvelope {
    RequestEnvelope::new(correlation, tool, arguments)
}

pub fn test_session(group: &str) -> Session {
    Session::new(group, format!("ctr-{group}"), ConnectionIdentity::generate(), 1_000_000)
}

// ── Audit capture ───────────────────────────────────────────────────────

/// Audit sink that retains entries in memory for assertions.
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, entry: AuditEntry) {
        self.entries.lock().push(entry);
    }
}
