// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The five-stage request validation pipeline.
//!
//! Every tool invocation from a containerized agent runs these stages in
//! order; the first failure produces the wire error and no later stage
//! observes the request:
//!
//! 1. identity: overwrite wire identity claims from the session registry
//! 2. tool: exact-match catalog lookup
//! 3. schema: compiled argument validation
//! 4. authorization + rate limit: group pinning, then dual token buckets
//! 5. confirmation: single-use pre-approval for high-risk tools
//!
//! A passing request dispatches to the plugin handler; the result (and any
//! handler error message) passes through the credential redactor before it
//! reaches the wire.

mod approval;
mod rate_limit;

pub use approval::ApprovalStore;
pub use rate_limit::{RateLimitConfig, RateLimiter};

use std::sync::Arc;
use std::time::Duration;

use carapace_core::{
    AuditEntry, AuditOutcome, AuditSink, AuditStage, Clock, ConnectionIdentity, ErrorBody,
    RequestEnvelope, ResponseEnvelope, Session,
};
use carapace_plugins::{redact_value, HandlerRegistry, RiskLevel, SharedCatalog};
use serde_json::Value;
use tracing::{debug, warn};

use crate::registry::SessionRegistry;

/// Request identity after stage 1: entirely server-derived.
#[derive(Debug, Clone)]
struct ResolvedIdentity {
    session: Session,
    source: String,
}

/// The pipeline and its collaborators.
pub struct RequestPipeline<C: Clock> {
    registry: SessionRegistry,
    catalog: SharedCatalog,
    handlers: HandlerRegistry,
    rate_limiter: RateLimiter<C>,
    approvals: ApprovalStore,
    audit: Arc<dyn AuditSink>,
    confirmation_wait: Duration,
    clock: C,
}

impl<C: Clock> RequestPipeline<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: SessionRegistry,
        catalog: SharedCatalog,
        handlers: HandlerRegistry,
        rate_limit: RateLimitConfig,
        approvals: ApprovalStore,
        audit: Arc<dyn AuditSink>,
        confirmation_wait: Duration,
        clock: C,
    ) -> Self {
        Self {
            registry,
            catalog,
            handlers,
            rate_limiter: RateLimiter::new(rate_limit, clock.clone()),
            approvals,
            audit,
            confirmation_wait,
            clock,
        }
    }

    /// Pre-approvals handle (granted by the operator surface).
    pub fn approvals(&self) -> &ApprovalStore {
        &self.approvals
    }

    /// Drop per-session rate-limit state after shutdown.
    pub fn forget_session(&self, session: &carapace_core::SessionId) {
        self.rate_limiter.forget_session(session);
    }

    /// Run one request through all five stages and the handler.
    pub async fn handle(
        &self,
        identity: &ConnectionIdentity,
        request: RequestEnvelope,
    ) -> ResponseEnvelope {
        // Stage 1: wire-format isolation. Whatever identity the client put
        // on the wire is discarded; the registry entry for the transport
        // identity is the only source of group/session/source.
        let Some(session) = self.registry.by_identity(identity) else {
            warn!(identity = %identity, "request on unregistered connection identity");
            return ResponseEnvelope::err(ErrorBody::unauthorized("unknown connection identity"));
        };
        let resolved = ResolvedIdentity {
            source: format!("session:{}", session.id),
            session,
        };

        match self.run_stages(&resolved, &request).await {
            Ok(response) => response,
            Err(rejection) => {
                self.audit_rejection(&resolved, &request, &rejection);
                ResponseEnvelope::err(rejection.error)
            }
        }
    }

    async fn run_stages(
        &self,
        resolved: &ResolvedIdentity,
        request: &RequestEnvelope,
    ) -> Result<ResponseEnvelope, Rejection> {
        let catalog = self.catalog.snapshot();

        // Stage 2: tool resolution, exact string equality only.
        let Some(entry) = catalog.lookup(&request.tool) else {
            return Err(Rejection::new(AuditStage::Tool, ErrorBody::unknown_tool(&request.tool)));
        };

        // Stage 3: schema validation of untrusted arguments.
        if let Err(e) = entry.validate_args(&request.arguments) {
            return Err(Rejection::new(
                AuditStage::Schema,
                ErrorBody::validation_failed(e.field, e.message),
            ));
        }

        // Stage 4a: group authorization against the stage-1 group.
        if let Some(ref allowed) = entry.allowed_groups {
            if !allowed.iter().any(|g| g == &resolved.session.group) {
                return Err(Rejection::new(
                    AuditStage::Authorization,
                    ErrorBody::unauthorized(format!(
                        "tool {} is not available to group {}",
                        entry.tool, resolved.session.group
                    )),
                ));
            }
        }

        // Stage 4b: both token buckets must admit.
        if let Err(retry_after) = self.rate_limiter.admit(
            &resolved.session.id,
            &resolved.session.group,
            &entry.tool,
        ) {
            return Err(Rejection::new(
                AuditStage::RateLimit,
                ErrorBody::rate_limited(retry_after),
            ));
        }

        // Stage 5: confirmation gate for high-risk tools.
        if entry.risk_level == RiskLevel::High {
            let confirmed = self
                .approvals
                .wait_and_consume(&request.correlation_id, self.confirmation_wait)
                .await;
            if !confirmed {
                return Err(Rejection::new(
                    AuditStage::Confirmation,
                    ErrorBody::confirmation_timeout(&entry.tool),
                ));
            }
        }

        // Dispatch to the plugin handler.
        let Some(handler) = self.handlers.get(&entry.plugin) else {
            return Err(Rejection::new(
                AuditStage::Handler,
                ErrorBody::plugin_error(format!("no handler loaded for plugin {}", entry.plugin)),
            ));
        };

        debug!(tool = %entry.tool, session = %resolved.session.id, "dispatching tool");
        match handler.handle(&entry.tool, &request.arguments).await {
            Ok(result) => Ok(ResponseEnvelope::ok(sanitize(result))),
            Err(e) => Err(Rejection::new(
                AuditStage::Handler,
                ErrorBody::handler_error(sanitize_text(e.message), e.retriable),
            )),
        }
    }

    fn audit_rejection(
        &self,
        resolved: &ResolvedIdentity,
        request: &RequestEnvelope,
        rejection: &Rejection,
    ) {
        self.audit.append(AuditEntry {
            timestamp_ms: self.clock.epoch_ms(),
            group: resolved.session.group.clone(),
            source: resolved.source.clone(),
            topic: request.tool.clone(),
            correlation: request.correlation_id.clone(),
            stage: rejection.stage,
            outcome: AuditOutcome::Rejected,
            reason: rejection
                .error
                .field
                .as_deref()
                .map(|f| format!("{} ({f})", rejection.error.message))
                .unwrap_or_else(|| rejection.error.message.clone()),
        });
    }
}

/// Internal rejection: the stage that failed plus the wire error.
struct Rejection {
    stage: AuditStage,
    error: ErrorBody,
}

impl Rejection {
    fn new(stage: AuditStage, error: ErrorBody) -> Self {
        Self { stage, error }
    }
}

/// Redact credential-shaped values from a handler result.
fn sanitize(result: Value) -> Value {
    let redaction = redact_value(&result);
    if !redaction.redacted_paths.is_empty() {
        debug!(paths = ?redaction.redacted_paths, "redacted response leaves");
    }
    redaction.value
}

/// Redact a bare string (handler error messages).
fn sanitize_text(message: String) -> String {
    match redact_value(&Value::String(message)).value {
        Value::String(s) => s,
        _ => String::new(),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
