// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn audit_entry_roundtrips() {
    let entry = AuditEntry {
        timestamp_ms: 1234,
        group: "email".into(),
        source: "imap".into(),
        topic: "message.inbound".into(),
        correlation: "corr-1".into(),
        stage: AuditStage::Dispatch,
        outcome: AuditOutcome::Rejected,
        reason: "payload failed schema validation".into(),
    };
    let json = serde_json::to_string(&entry).unwrap();
    let back: AuditEntry = serde_json::from_str(&json).unwrap();
    assert_eq!(entry, back);
}

#[test]
fn stage_names_are_kebab_case() {
    assert_eq!(
        serde_json::to_value(AuditStage::RateLimit).unwrap(),
        serde_json::json!("rate-limit")
    );
}

#[test]
fn null_sink_accepts_entries() {
    let sink = NullAuditSink;
    sink.append(AuditEntry {
        timestamp_ms: 0,
        group: String::new(),
        source: String::new(),
        topic: String::new(),
        correlation: String::new(),
        stage: AuditStage::Tool,
        outcome: AuditOutcome::Dropped,
        reason: String::new(),
    });
}
