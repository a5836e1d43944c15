// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry: connection identity → session.
//!
//! Single-writer discipline: only the lifecycle manager mutates this map
//! (spawn, shutdown, orphan cleanup). Readers (pipeline stage 1, the
//! dispatcher's concurrency check) get cloned snapshots, so a session is
//! always observed fully present or fully absent.

use std::collections::HashMap;
use std::sync::Arc;

use carapace_core::{ConnectionIdentity, Session, SessionId, SessionState};
use parking_lot::RwLock;

/// In-memory index over live sessions.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<ConnectionIdentity, Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly-spawned session. Lifecycle manager only.
    pub fn insert(&self, session: Session) {
        self.inner.write().insert(session.connection_identity, session);
    }

    /// Drop a session by id. Lifecycle manager only.
    pub fn remove(&self, id: &SessionId) -> Option<Session> {
        let mut map = self.inner.write();
        let identity = map.values().find(|s| &s.id == id)?.connection_identity;
        map.remove(&identity)
    }

    /// Update a session's lifecycle state. Lifecycle manager only.
    pub fn set_state(&self, id: &SessionId, state: SessionState) {
        let mut map = self.inner.write();
        if let Some(session) = map.values_mut().find(|s| &s.id == id) {
            session.state = state;
        }
    }

    /// Stage-1 lookup: the trusted identity → session mapping.
    pub fn by_identity(&self, identity: &ConnectionIdentity) -> Option<Session> {
        self.inner.read().get(identity).cloned()
    }

    pub fn by_id(&self, id: &SessionId) -> Option<Session> {
        self.inner.read().values().find(|s| &s.id == id).cloned()
    }

    /// Live sessions in a group (for the spawn concurrency cap).
    pub fn live_count(&self, group: &str) -> usize {
        self.inner.read().values().filter(|s| s.group == group && s.state.is_live()).count()
    }

    pub fn all(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.inner.read().values().cloned().collect();
        sessions.sort_by(|a, b| a.started_at_ms.cmp(&b.started_at_ms));
        sessions
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
