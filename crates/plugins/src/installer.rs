// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin installer: install, list, remove, update, configure, verify.
//!
//! The installer is the only component that executes git against
//! third-party input, so every entry point starts with name and URL policy
//! checks, and every failure after a clone removes the plugin directory:
//! a plugin directory that exists always held a validated manifest at
//! install time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::credentials::{check_credential, CredentialCheck};
use crate::error::PluginError;
use crate::git::GitOps;
use crate::handler::PluginHandler;
use crate::manifest::{CredentialSpec, PluginManifest};
use crate::redact::redact_value;
use crate::registry::{PluginListing, PluginRegistry};
use crate::sanitize::{sanitize_repo, SanitizeReport};

/// Shell metacharacters that must never appear in a clone URL.
const URL_METACHARACTERS: &[char] =
    &[';', '|', '&', '$', '`', '(', ')', '{', '}', '\n', '\r'];

/// Hard cap on a handler smoke test during `verify`.
const SMOKE_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Successful install result.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub name: String,
    pub version: String,
    /// Declared credentials the operator still has to provision. The
    /// installer never reads or writes credential values.
    pub credentials: Vec<CredentialSpec>,
    pub sanitize: SanitizeReport,
}

#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    pub removed_credentials: bool,
    /// Running sessions keep their catalog snapshot; a restart republishes.
    pub requires_restart: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub old_version: String,
    pub new_version: String,
    /// Credential keys required by the new version but not the old one.
    pub new_credentials: Vec<String>,
    pub sanitize: SanitizeReport,
}

#[derive(Debug, Clone)]
pub struct ConfigureOutcome {
    pub config: Value,
}

#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub credentials: Vec<CredentialCheck>,
    /// Present only when a handler with a self-test was available.
    pub smoke_ok: Option<bool>,
    pub smoke_detail: Option<Value>,
    pub ready: bool,
}

/// Installs and manages plugins under `<home>/plugins`.
pub struct PluginInstaller {
    registry: PluginRegistry,
    credentials_dir: PathBuf,
    git: Arc<dyn GitOps>,
}

impl PluginInstaller {
    pub fn new(
        plugins_dir: impl Into<PathBuf>,
        credentials_dir: impl Into<PathBuf>,
        git: Arc<dyn GitOps>,
    ) -> Self {
        Self {
            registry: PluginRegistry::new(plugins_dir),
            credentials_dir: credentials_dir.into(),
            git,
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    fn credential_dir(&self, name: &str) -> PathBuf {
        self.credentials_dir.join(name)
    }

    /// Install a plugin from a git URL.
    pub async fn install(
        &self,
        url: &str,
        name_override: Option<&str>,
    ) -> Result<InstallOutcome, PluginError> {
        validate_url(url)?;

        // An empty override falls through to the URL-derived name.
        let name = match name_override.filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => derive_name(url)?,
        };
        validate_name(&name)?;

        let dir = self.registry.plugin_dir(&name);
        if dir.exists() {
            return Err(PluginError::AlreadyInstalled(name));
        }

        self.git.clone_hardened(url, &dir).await.map_err(|e| {
            // A failed clone may leave a partial directory behind.
            remove_dir_quiet(&dir);
            e
        })?;

        // Everything after the clone shares one cleanup path: any failure
        // removes the directory before the error surfaces.
        match self.harden_and_validate(&dir).await {
            Ok((manifest, sanitize)) => {
                info!(plugin = %name, version = %manifest.version, "plugin installed");
                Ok(InstallOutcome {
                    name,
                    version: manifest.version.clone(),
                    credentials: manifest
                        .install
                        .map(|i| i.credentials)
                        .unwrap_or_default(),
                    sanitize,
                })
            }
            Err(e) => {
                remove_dir_quiet(&dir);
                Err(e)
            }
        }
    }

    /// Sanitize a cloned tree and validate its manifest.
    async fn harden_and_validate(
        &self,
        dir: &Path,
    ) -> Result<(PluginManifest, SanitizeReport), PluginError> {
        let sanitize = sanitize_repo(self.git.as_ref(), dir).await?;
        if sanitize.rejected {
            return Err(PluginError::SanitizeRejected(sanitize.rejection_reasons));
        }
        let manifest = PluginManifest::load(dir)?;
        Ok((manifest, sanitize))
    }

    /// List installed plugins; broken installs carry an error field.
    pub fn list(&self, include_builtin: bool) -> Vec<PluginListing> {
        let mut listings = self.registry.discover();
        if include_builtin {
            let manifest = crate::builtin::installer_manifest();
            listings.insert(
                0,
                PluginListing {
                    name: "installer".to_string(),
                    path: PathBuf::new(),
                    manifest: Some(manifest),
                    error: None,
                    git_backed: false,
                },
            );
        }
        listings
    }

    /// Remove an installed plugin (and optionally its credentials).
    pub fn remove(
        &self,
        name: &str,
        remove_credentials: bool,
    ) -> Result<RemoveOutcome, PluginError> {
        if crate::builtin::RESERVED_PLUGIN_NAMES.contains(&name) {
            return Err(PluginError::ReservedName(name.to_string()));
        }
        let dir = self.registry.plugin_dir(name);
        if !dir.exists() {
            return Err(PluginError::NotInstalled(name.to_string()));
        }
        std::fs::remove_dir_all(&dir)?;

        let mut removed_credentials = false;
        if remove_credentials {
            let cred_dir = self.credential_dir(name);
            if cred_dir.exists() {
                std::fs::remove_dir_all(&cred_dir)?;
                removed_credentials = true;
            }
        }

        info!(plugin = %name, removed_credentials, "plugin removed");
        Ok(RemoveOutcome { removed_credentials, requires_restart: true })
    }

    /// Update a git-backed plugin to the remote default branch head.
    pub async fn update(&self, name: &str) -> Result<UpdateOutcome, PluginError> {
        let dir = self.registry.plugin_dir(name);
        if !dir.exists() {
            return Err(PluginError::NotInstalled(name.to_string()));
        }
        if !dir.join(".git").is_dir() {
            return Err(PluginError::NotGitBacked(name.to_string()));
        }

        let old = PluginManifest::load(&dir)?;

        self.git.fetch(&dir).await?;
        let branch = self.git.default_branch(&dir).await?;
        self.git.checkout(&dir, &branch).await?;

        // The update may have brought hostile content; the directory stays
        // (it held a valid install) but the error blocks use of the update.
        let (new, sanitize) = self.harden_and_validate(&dir).await?;

        let old_keys: Vec<String> =
            old.credential_keys().into_iter().map(String::from).collect();
        let new_credentials: Vec<String> = new
            .credential_keys()
            .into_iter()
            .filter(|k| !old_keys.iter().any(|old| old == k))
            .map(String::from)
            .collect();

        info!(
            plugin = %name,
            old_version = %old.version,
            new_version = %new.version,
            "plugin updated"
        );
        Ok(UpdateOutcome {
            old_version: old.version,
            new_version: new.version,
            new_credentials,
            sanitize,
        })
    }

    /// Set one configuration key, type-checked against the plugin's
    /// declared `config_schema`.
    pub fn configure(
        &self,
        name: &str,
        key: &str,
        value: Value,
    ) -> Result<ConfigureOutcome, PluginError> {
        let dir = self.registry.plugin_dir(name);
        if !dir.exists() {
            return Err(PluginError::NotInstalled(name.to_string()));
        }
        let manifest = PluginManifest::load(&dir)?;
        let schema = manifest
            .config_schema
            .ok_or_else(|| PluginError::NoConfigSchema(name.to_string()))?;

        let property = schema
            .get("properties")
            .and_then(|p| p.get(key))
            .ok_or_else(|| PluginError::UnknownConfigKey {
                plugin: name.to_string(),
                key: key.to_string(),
            })?;

        if let Some(expected) = property.get("type").and_then(|t| t.as_str()) {
            let got = json_type_name(&value);
            if !type_matches(expected, &value) {
                return Err(PluginError::ConfigTypeMismatch {
                    key: key.to_string(),
                    expected: expected.to_string(),
                    got: got.to_string(),
                });
            }
        }

        let config_path = dir.join("config.json");
        let mut config: Value = match std::fs::read_to_string(&config_path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(_) => Value::Object(Default::default()),
        };
        if !config.is_object() {
            config = Value::Object(Default::default());
        }
        if let Some(obj) = config.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
        std::fs::write(&config_path, serde_json::to_vec_pretty(&config)?)?;

        Ok(ConfigureOutcome { config })
    }

    /// Verify a plugin: credential metadata checks, then an optional
    /// handler smoke test under a hard timeout.
    pub async fn verify(
        &self,
        name: &str,
        handler: Option<Arc<dyn PluginHandler>>,
    ) -> Result<VerifyOutcome, PluginError> {
        let dir = self.registry.plugin_dir(name);
        if !dir.exists() {
            return Err(PluginError::NotInstalled(name.to_string()));
        }
        let manifest = PluginManifest::load(&dir)?;

        // Phase 1: stat every declared credential. Contents are never read.
        let cred_dir = self.credential_dir(name);
        let specs = manifest.install.map(|i| i.credentials).unwrap_or_default();
        let credentials: Vec<CredentialCheck> =
            specs.iter().map(|spec| check_credential(&cred_dir, &spec.key)).collect();
        let creds_ok = specs
            .iter()
            .zip(&credentials)
            .all(|(spec, check)| check.ok || !spec.required);

        // Phase 2: handler self-test, if one is loaded.
        let mut smoke_ok = None;
        let mut smoke_detail = None;
        if let Some(handler) = handler.filter(|h| h.supports_verify()) {
            match tokio::time::timeout(SMOKE_TEST_TIMEOUT, handler.verify()).await {
                Ok(Ok(result)) => {
                    smoke_ok = Some(result.ok);
                    smoke_detail = result.detail.map(|d| redact_value(&d).value);
                }
                Ok(Err(e)) => {
                    smoke_ok = Some(false);
                    smoke_detail = Some(Value::String(e.message));
                }
                Err(_) => {
                    warn!(plugin = %name, "smoke test timed out");
                    smoke_ok = Some(false);
                    smoke_detail = Some(Value::String("smoke test timed out".to_string()));
                }
            }
        }

        let ready = creds_ok && smoke_ok.unwrap_or(true);
        Ok(VerifyOutcome { credentials, smoke_ok, smoke_detail, ready })
    }
}

/// Names must match `^[a-z][a-z0-9_-]*$` and must not be reserved.
fn validate_name(name: &str) -> Result<(), PluginError> {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !valid_start || !valid_rest {
        return Err(PluginError::InvalidName(name.to_string()));
    }
    if crate::builtin::RESERVED_PLUGIN_NAMES.contains(&name) {
        return Err(PluginError::ReservedName(name.to_string()));
    }
    Ok(())
}

/// Only `https://` and `git@` URLs; no shell metacharacters anywhere.
fn validate_url(url: &str) -> Result<(), PluginError> {
    if !url.starts_with("https://") && !url.starts_with("git@") {
        return Err(PluginError::BlockedUrl(format!(
            "{url} (only https:// and git@ URLs are allowed)"
        )));
    }
    if url.contains(URL_METACHARACTERS) || url.contains(char::is_whitespace) {
        return Err(PluginError::BlockedUrl(format!("{url} (contains shell metacharacters)")));
    }
    Ok(())
}

/// Last path segment of the URL with any `.git` suffix stripped.
fn derive_name(url: &str) -> Result<String, PluginError> {
    let trimmed = url.trim_end_matches('/');
    let segment = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git");
    if segment.is_empty() {
        return Err(PluginError::InvalidName(format!("cannot derive a name from {url}")));
    }
    Ok(segment.to_string())
}

fn remove_dir_quiet(dir: &Path) {
    if dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "failed to remove plugin directory");
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
        "number" => value.is_number(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => false,
    }
}

#[cfg(test)]
#[path = "installer_tests.rs"]
mod tests;
