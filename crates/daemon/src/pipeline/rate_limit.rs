// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-bucket rate limiting per (session, tool) and (group, tool).
//!
//! Both buckets must admit a request; neither is debited unless both do.
//! Refill happens lazily on access through the clock seam, so tests drive
//! time with a fake clock.

use std::collections::HashMap;
use std::time::Instant;

use carapace_core::{Clock, SessionId};
use parking_lot::Mutex;
use serde::Deserialize;

/// Bucket parameters shared by every scope.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitConfig {
    /// Burst size; also the cap a bucket refills to.
    pub capacity: f64,
    pub refill_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { capacity: 8.0, refill_per_sec: 0.5 }
    }
}

#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(config: &RateLimitConfig, now: Instant) -> Self {
        Self { tokens: config.capacity, last_refill: now }
    }

    fn refill(&mut self, config: &RateLimitConfig, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * config.refill_per_sec).min(config.capacity);
        self.last_refill = now;
    }

    fn has_token(&self) -> bool {
        self.tokens >= 1.0
    }

    fn take(&mut self) {
        // Guarded by has_token; tokens never go negative.
        self.tokens = (self.tokens - 1.0).max(0.0);
    }

    /// Seconds until one full token is available. Non-zero whenever the
    /// bucket just rejected.
    fn retry_after(&self, config: &RateLimitConfig) -> f64 {
        if self.has_token() {
            return 0.0;
        }
        ((1.0 - self.tokens) / config.refill_per_sec).max(0.001)
    }
}

/// Dual-scope limiter used by pipeline stage 4b.
pub struct RateLimiter<C: Clock> {
    config: RateLimitConfig,
    clock: C,
    per_session: Mutex<HashMap<(SessionId, String), TokenBucket>>,
    per_group: Mutex<HashMap<(String, String), TokenBucket>>,
}

impl<C: Clock> RateLimiter<C> {
    pub fn new(config: RateLimitConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            per_session: Mutex::new(HashMap::new()),
            per_group: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject one request. On rejection returns `retry_after`
    /// seconds (fractional, > 0).
    pub fn admit(&self, session: &SessionId, group: &str, tool: &str) -> Result<(), f64> {
        let now = self.clock.now();
        let mut sessions = self.per_session.lock();
        let mut groups = self.per_group.lock();

        let session_bucket = sessions
            .entry((session.clone(), tool.to_string()))
            .or_insert_with(|| TokenBucket::new(&self.config, now));
        session_bucket.refill(&self.config, now);

        let group_bucket = groups
            .entry((group.to_string(), tool.to_string()))
            .or_insert_with(|| TokenBucket::new(&self.config, now));
        group_bucket.refill(&self.config, now);

        // Check both before debiting either.
        if !session_bucket.has_token() || !group_bucket.has_token() {
            let retry = session_bucket
                .retry_after(&self.config)
                .max(group_bucket.retry_after(&self.config));
            return Err(retry);
        }

        session_bucket.take();
        group_bucket.take();
        Ok(())
    }

    /// Drop per-session buckets when a session ends.
    pub fn forget_session(&self, session: &SessionId) {
        self.per_session.lock().retain(|(id, _), _| id != session);
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
