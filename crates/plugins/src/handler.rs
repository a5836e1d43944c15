// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin handler contract.
//!
//! A handler executes the tools one plugin provides. Handlers run in the
//! supervisor process; the request pipeline only dispatches to them after
//! all five validation stages pass.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

/// Failure inside plugin logic. Retriability is reported by the handler
/// itself; the pipeline passes it through to the wire.
#[derive(Debug, Clone)]
pub struct HandlerError {
    pub message: String,
    pub retriable: bool,
}

impl HandlerError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self { message: message.into(), retriable: false }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self { message: message.into(), retriable: true }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HandlerError {}

/// Result of a handler's self-test (`verify` phase 2).
#[derive(Debug, Clone, PartialEq)]
pub struct SmokeTestResult {
    pub ok: bool,
    pub detail: Option<Value>,
}

/// Executes one plugin's tools.
#[async_trait]
pub trait PluginHandler: Send + Sync {
    /// Run a tool with already-validated arguments.
    async fn handle(&self, tool: &str, arguments: &Value) -> Result<Value, HandlerError>;

    /// Whether this handler implements a self-test.
    fn supports_verify(&self) -> bool {
        false
    }

    /// Self-test against live backing services. Callers race this against a
    /// hard 10-second timeout.
    async fn verify(&self) -> Result<SmokeTestResult, HandlerError> {
        Err(HandlerError::fatal("verify not supported"))
    }
}

/// Shared map `plugin name → handler`.
///
/// Registered at startup; the pipeline resolves a catalog entry's plugin
/// name here. A tool whose plugin has no loaded handler is a wire-level
/// `PLUGIN_ERROR`.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn PluginHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, plugin: impl Into<String>, handler: Arc<dyn PluginHandler>) {
        self.handlers.write().insert(plugin.into(), handler);
    }

    pub fn get(&self, plugin: &str) -> Option<Arc<dyn PluginHandler>> {
        self.handlers.read().get(plugin).cloned()
    }
}
