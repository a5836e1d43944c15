// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_session_starts_in_starting_state() {
    let session = Session::new("email", "ctr-1", ConnectionIdentity::generate(), 1000);
    assert_eq!(session.state, SessionState::Starting);
    assert_eq!(session.group, "email");
    assert!(session.id.as_str().starts_with("ses-"));
}

#[test]
fn liveness_by_state() {
    assert!(SessionState::Starting.is_live());
    assert!(SessionState::Running.is_live());
    assert!(!SessionState::ShuttingDown.is_live());
    assert!(!SessionState::Gone.is_live());
}

#[test]
fn session_state_serializes_kebab_case() {
    assert_eq!(
        serde_json::to_value(SessionState::ShuttingDown).unwrap(),
        serde_json::json!("shutting-down")
    );
}
