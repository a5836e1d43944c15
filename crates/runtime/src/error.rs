// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors from container engine operations.

use thiserror::Error;

/// Errors surfaced by [`crate::ContainerRuntime`] implementations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The engine binary is missing or the daemon is unreachable.
    #[error("container engine unavailable: {0}")]
    Unavailable(String),

    /// The referenced container or image no longer exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// An engine CLI invocation failed. `retriable` is set for conditions
    /// that are plausibly transient (e.g. network failure during pull).
    #[error("{op} failed: {detail}")]
    CommandFailed { op: &'static str, detail: String, retriable: bool },

    /// Engine output could not be parsed into the canonical model.
    #[error("could not parse engine output: {0}")]
    Parse(String),

    /// The driver does not implement this optional capability.
    #[error("operation not supported by this engine: {0}")]
    Unsupported(&'static str),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, RuntimeError::CommandFailed { retriable: true, .. })
    }
}
