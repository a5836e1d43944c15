// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event dispatcher: topic → spawn decision.
//!
//! Consumes bus events and decides whether to spawn an agent. The
//! dispatcher never throws; every outcome is a [`DispatchResult`] value and
//! rejections are audited.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::OnceLock;

use async_trait::async_trait;
use carapace_core::{
    AuditEntry, AuditOutcome, AuditSink, AuditStage, Clock, EventEnvelope, SessionId,
    TOPIC_MESSAGE_INBOUND, TOPIC_TASK_TRIGGERED,
};
use jsonschema::JSONSchema;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::registry::SessionRegistry;

/// Outcome of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    Spawned(SessionId),
    /// Not for us: empty group, unknown topic, unconfigured group.
    Dropped(String),
    /// For us but refused: bad payload, concurrency cap.
    Rejected(String),
    /// Spawning was warranted but failed.
    Error(String),
}

/// Spawns an agent for a group. Implemented by the lifecycle manager.
#[async_trait]
pub trait AgentSpawner: Send + Sync {
    async fn spawn_agent(
        &self,
        group: &str,
        env: BTreeMap<String, String>,
    ) -> Result<SessionId, String>;
}

/// Routes spawn-worthy events to the lifecycle manager.
pub struct EventDispatcher<C: Clock> {
    groups: HashSet<String>,
    max_sessions_per_group: usize,
    registry: SessionRegistry,
    spawner: Arc<dyn AgentSpawner>,
    audit: Arc<dyn AuditSink>,
    clock: C,
}

impl<C: Clock> EventDispatcher<C> {
    pub fn new(
        groups: impl IntoIterator<Item = String>,
        max_sessions_per_group: usize,
        registry: SessionRegistry,
        spawner: Arc<dyn AgentSpawner>,
        audit: Arc<dyn AuditSink>,
        clock: C,
    ) -> Self {
        Self {
            groups: groups.into_iter().collect(),
            max_sessions_per_group,
            registry,
            spawner,
            audit,
            clock,
        }
    }

    /// Decide and (maybe) spawn for one event.
    pub async fn dispatch(&self, event: &EventEnvelope) -> DispatchResult {
        // 1. No group, nothing to route to.
        if event.group.is_empty() {
            return DispatchResult::Dropped("empty group".to_string());
        }

        // 2. Only spawn topics are interesting.
        if !EventEnvelope::is_spawn_topic(&event.topic) {
            debug!(topic = %event.topic, "dropping non-spawn topic");
            return DispatchResult::Dropped(format!("topic {} not in spawn set", event.topic));
        }

        // 3. Inbound messages only for configured groups.
        if event.topic == TOPIC_MESSAGE_INBOUND && !self.groups.contains(&event.group) {
            debug!(group = %event.group, "dropping message for unconfigured group");
            return DispatchResult::Dropped(format!("group {} not configured", event.group));
        }

        // 4. The payload is the untrusted part of the envelope.
        if event.topic == TOPIC_MESSAGE_INBOUND {
            if let Err(reason) = validate_inbound_payload(&event.payload) {
                self.audit_rejection(event, &reason);
                return DispatchResult::Rejected(reason);
            }
        }

        // 5. Concurrency cap per group.
        let live = self.registry.live_count(&event.group);
        if live >= self.max_sessions_per_group {
            let reason = format!(
                "group {} at capacity ({live}/{} sessions)",
                event.group, self.max_sessions_per_group
            );
            self.audit_rejection(event, &reason);
            return DispatchResult::Rejected(reason);
        }

        // 6. Spawn, with the task prompt (if any) passed through env.
        let mut env = BTreeMap::new();
        env.insert("CARAPACE_EVENT_SOURCE".to_string(), event.source.clone());
        env.insert("CARAPACE_CORRELATION".to_string(), event.correlation.clone());
        if event.topic == TOPIC_TASK_TRIGGERED {
            if let Some(prompt) = event.payload.get("prompt").and_then(|v| v.as_str()) {
                env.insert("task-prompt".to_string(), prompt.to_string());
            }
        }

        match self.spawner.spawn_agent(&event.group, env).await {
            Ok(session_id) => {
                info!(group = %event.group, session = %session_id, "agent spawned for event");
                DispatchResult::Spawned(session_id)
            }
            Err(e) => {
                warn!(group = %event.group, error = %e, "spawn failed");
                self.audit_error(event, &e);
                DispatchResult::Error(e)
            }
        }
    }

    fn audit_rejection(&self, event: &EventEnvelope, reason: &str) {
        self.audit.append(AuditEntry {
            timestamp_ms: self.clock.epoch_ms(),
            group: event.group.clone(),
            source: event.source.clone(),
            topic: event.topic.clone(),
            correlation: event.correlation.clone(),
            stage: AuditStage::Dispatch,
            outcome: AuditOutcome::Rejected,
            reason: reason.to_string(),
        });
    }

    fn audit_error(&self, event: &EventEnvelope, reason: &str) {
        self.audit.append(AuditEntry {
            timestamp_ms: self.clock.epoch_ms(),
            group: event.group.clone(),
            source: event.source.clone(),
            topic: event.topic.clone(),
            correlation: event.correlation.clone(),
            stage: AuditStage::Dispatch,
            outcome: AuditOutcome::Error,
            reason: reason.to_string(),
        });
    }
}

/// Schema for the untrusted `message.inbound` payload.
fn inbound_payload_schema() -> &'static JSONSchema {
    static SCHEMA: OnceLock<JSONSchema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let schema = json!({
            "type": "object",
            "required": ["text"],
            "properties": {
                "text": {"type": "string"},
                "sender": {"type": "string"},
                "subject": {"type": "string"},
                "thread": {"type": "string"},
            },
        });
        #[allow(clippy::expect_used)]
        let compiled = JSONSchema::compile(&schema).expect("inbound payload schema compiles");
        compiled
    })
}

fn validate_inbound_payload(payload: &serde_json::Value) -> Result<(), String> {
    let schema = inbound_payload_schema();
    match schema.validate(payload) {
        Ok(()) => Ok(()),
        Err(mut errors) => {
            let detail = errors
                .next()
                .map(|e| format!("{} (at {})", e, e.instance_path))
                .unwrap_or_else(|| "payload failed schema validation".to_string());
            Err(format!("payload failed schema validation: {detail}"))
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
