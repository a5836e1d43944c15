// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors from plugin management operations.

use thiserror::Error;

/// Errors from the installer, registry, and manifest loading.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid plugin name: {0} (must match ^[a-z][a-z0-9_-]*$)")]
    InvalidName(String),

    #[error("plugin name is reserved: {0}")]
    ReservedName(String),

    #[error("plugin already installed: {0}")]
    AlreadyInstalled(String),

    #[error("plugin not installed: {0}")]
    NotInstalled(String),

    #[error("blocked repository URL: {0}")]
    BlockedUrl(String),

    #[error("repository rejected by sanitizer: {}", .0.join("; "))]
    SanitizeRejected(Vec<String>),

    #[error("manifest invalid: {0}")]
    ManifestInvalid(String),

    #[error("plugin {0} was not installed from git")]
    NotGitBacked(String),

    #[error("plugin {0} declares no config_schema")]
    NoConfigSchema(String),

    #[error("unknown config key {key} for plugin {plugin}")]
    UnknownConfigKey { plugin: String, key: String },

    #[error("config value for {key} must be {expected}, got {got}")]
    ConfigTypeMismatch { key: String, expected: String, got: String },

    #[error("git operation failed: {0}")]
    Git(#[from] crate::git::GitError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
