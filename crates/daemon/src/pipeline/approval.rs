// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-approvals for high-risk tool invocations.
//!
//! A pre-approval is a single-use token keyed by correlation id. Stage 5
//! consumes at most one per request; a request arriving before its approval
//! waits up to the configured window for it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Store of outstanding one-shot approvals.
#[derive(Clone, Default)]
pub struct ApprovalStore {
    granted: Arc<Mutex<HashSet<String>>>,
    notify: Arc<Notify>,
}

impl ApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a single-use approval for one correlation id.
    pub fn grant(&self, correlation_id: impl Into<String>) {
        self.granted.lock().insert(correlation_id.into());
        self.notify.notify_waiters();
    }

    /// Consume the approval if present. At most one caller wins.
    pub fn consume(&self, correlation_id: &str) -> bool {
        self.granted.lock().remove(correlation_id)
    }

    /// Wait up to `window` for a matching approval, consuming it on
    /// arrival. Returns `false` on timeout; the timer is bounded and the
    /// wait holds no locks.
    pub async fn wait_and_consume(&self, correlation_id: &str, window: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            // Register interest before checking, so a grant racing with the
            // check cannot be missed.
            let notified = self.notify.notified();
            if self.consume(correlation_id) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                // Final check: the grant may have landed exactly at the
                // deadline.
                return self.consume(correlation_id);
            }
        }
    }
}

#[cfg(test)]
#[path = "approval_tests.rs"]
mod tests;
