// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use carapace_core::test_support::test_session;

use super::*;

#[test]
fn insert_then_lookup_by_identity_and_id() {
    let registry = SessionRegistry::new();
    let session = test_session("email");
    registry.insert(session.clone());

    let by_identity = registry.by_identity(&session.connection_identity).unwrap();
    assert_eq!(by_identity.id, session.id);
    assert_eq!(registry.by_id(&session.id).unwrap().group, "email");
}

#[test]
fn unknown_identity_is_absent() {
    let registry = SessionRegistry::new();
    assert!(registry.by_identity(&carapace_core::ConnectionIdentity::generate()).is_none());
}

#[test]
fn remove_clears_both_indexes() {
    let registry = SessionRegistry::new();
    let session = test_session("email");
    registry.insert(session.clone());

    let removed = registry.remove(&session.id).unwrap();
    assert_eq!(removed.id, session.id);
    assert!(registry.by_identity(&session.connection_identity).is_none());
    assert!(registry.by_id(&session.id).is_none());
    assert!(registry.remove(&session.id).is_none());
}

#[test]
fn live_count_tracks_state() {
    let registry = SessionRegistry::new();
    let a = test_session("email");
    let b = test_session("email");
    let c = test_session("slack");
    registry.insert(a.clone());
    registry.insert(b.clone());
    registry.insert(c);

    assert_eq!(registry.live_count("email"), 2);
    assert_eq!(registry.live_count("slack"), 1);
    assert_eq!(registry.live_count("sms"), 0);

    registry.set_state(&a.id, SessionState::ShuttingDown);
    assert_eq!(registry.live_count("email"), 1);
}

#[test]
fn all_is_ordered_by_start_time() {
    let registry = SessionRegistry::new();
    let mut a = test_session("email");
    a.started_at_ms = 2_000;
    let mut b = test_session("slack");
    b.started_at_ms = 1_000;
    registry.insert(a);
    registry.insert(b);

    let all = registry.all();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].group, "slack");
    assert_eq!(all[1].group, "email");
}
