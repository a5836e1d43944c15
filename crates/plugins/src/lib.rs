// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin system: manifests, tool catalog, installer, and sanitizers.
//!
//! Plugins are directories under `<home>/plugins/<name>` carrying a
//! `manifest.json` that declares tools, credentials, and configuration.
//! Third-party plugins arrive via git; everything fetched is hardened by
//! the repo sanitizer before a manifest is even parsed, and responses from
//! plugin handlers pass through the credential redactor on their way out.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

#[cfg(test)]
mod test_fixtures;

mod builtin;
mod catalog;
mod credentials;
mod error;
mod git;
mod handler;
mod installer;
mod manifest;
mod redact;
mod registry;
mod sanitize;

pub use builtin::{installer_manifest, InstallerHandler, RESERVED_PLUGIN_NAMES};
pub use catalog::{ArgsError, CatalogEntry, CatalogError, SharedCatalog, ToolCatalog};
pub use credentials::{check_credential, CredentialCheck};
pub use error::PluginError;
pub use git::{GitError, GitOps, SystemGit};
pub use handler::{HandlerError, HandlerRegistry, PluginHandler, SmokeTestResult};
pub use installer::{
    ConfigureOutcome, InstallOutcome, PluginInstaller, RemoveOutcome, UpdateOutcome, VerifyOutcome,
};
pub use manifest::{CredentialSpec, PluginManifest, RiskLevel, ToolSpec};
pub use redact::{redact_value, Redaction};
pub use registry::{PluginListing, PluginRegistry};
pub use sanitize::{sanitize_repo, SanitizeReport};

#[cfg(any(test, feature = "test-support"))]
pub use git::FakeGit;
