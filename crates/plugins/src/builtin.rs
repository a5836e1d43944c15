// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in plugins and the reserved name set.
//!
//! The installer is itself exposed as the built-in `installer` plugin so
//! agents manage plugins through the same validated tool pipeline as
//! everything else.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::handler::{HandlerError, HandlerRegistry, PluginHandler};
use crate::installer::PluginInstaller;
use crate::manifest::PluginManifest;

/// Plugin names third parties can never claim.
pub const RESERVED_PLUGIN_NAMES: &[&str] =
    &["installer", "memory", "core", "system", "credentials"];

/// Manifest for the built-in installer plugin.
pub fn installer_manifest() -> PluginManifest {
    let doc = json!({
        "description": "Install and manage plugins",
        "version": env!("CARGO_PKG_VERSION"),
        "app_compat": "*",
        "author": {"name": "Carapace"},
        "provides": {
            "tools": [
                {
                    "name": "plugin_install",
                    "description": "Install a plugin from a git URL",
                    "risk_level": "high",
                    "arguments_schema": {
                        "type": "object",
                        "required": ["url"],
                        "properties": {
                            "url": {"type": "string"},
                            "name": {"type": "string"},
                        },
                        "additionalProperties": false,
                    },
                },
                {
                    "name": "plugin_list",
                    "description": "List installed plugins",
                    "risk_level": "low",
                    "arguments_schema": {
                        "type": "object",
                        "properties": {"include_builtin": {"type": "boolean"}},
                        "additionalProperties": false,
                    },
                },
                {
                    "name": "plugin_remove",
                    "description": "Remove an installed plugin",
                    "risk_level": "high",
                    "arguments_schema": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": {"type": "string"},
                            "remove_credentials": {"type": "boolean"},
                        },
                        "additionalProperties": false,
                    },
                },
                {
                    "name": "plugin_update",
                    "description": "Update a git-backed plugin",
                    "risk_level": "high",
                    "arguments_schema": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {"name": {"type": "string"}},
                        "additionalProperties": false,
                    },
                },
                {
                    "name": "plugin_configure",
                    "description": "Set one plugin configuration key",
                    "risk_level": "medium",
                    "arguments_schema": {
                        "type": "object",
                        "required": ["name", "key", "value"],
                        "properties": {
                            "name": {"type": "string"},
                            "key": {"type": "string"},
                            "value": {},
                        },
                        "additionalProperties": false,
                    },
                },
                {
                    "name": "plugin_verify",
                    "description": "Check a plugin's credentials and run its smoke test",
                    "risk_level": "low",
                    "arguments_schema": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {"name": {"type": "string"}},
                        "additionalProperties": false,
                    },
                },
            ],
        },
    });
    // A broken built-in manifest cannot be an input condition.
    #[allow(clippy::expect_used)]
    let manifest =
        PluginManifest::parse(&doc.to_string()).expect("built-in installer manifest is valid");
    manifest
}

/// Handler executing the installer's tools.
pub struct InstallerHandler {
    installer: Arc<PluginInstaller>,
    /// For `plugin_verify` phase 2: resolves the target plugin's handler.
    handlers: HandlerRegistry,
}

impl InstallerHandler {
    pub fn new(installer: Arc<PluginInstaller>, handlers: HandlerRegistry) -> Self {
        Self { installer, handlers }
    }
}

fn required_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, HandlerError> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerError::fatal(format!("missing argument: {key}")))
}

#[async_trait]
impl PluginHandler for InstallerHandler {
    async fn handle(&self, tool: &str, arguments: &Value) -> Result<Value, HandlerError> {
        match tool {
            "plugin_install" => {
                let url = required_str(arguments, "url")?;
                let name = arguments.get("name").and_then(|v| v.as_str());
                let outcome = self
                    .installer
                    .install(url, name)
                    .await
                    .map_err(|e| HandlerError::fatal(e.to_string()))?;
                Ok(json!({
                    "name": outcome.name,
                    "version": outcome.version,
                    "credentials": outcome
                        .credentials
                        .iter()
                        .map(|c| json!({"key": c.key, "description": c.description}))
                        .collect::<Vec<_>>(),
                    "hooks_removed": outcome.sanitize.hooks_removed,
                    "config_keys_stripped": outcome.sanitize.config_keys_stripped,
                }))
            }
            "plugin_list" => {
                let include_builtin =
                    arguments.get("include_builtin").and_then(|v| v.as_bool()).unwrap_or(false);
                let listings = self.installer.list(include_builtin);
                Ok(json!({
                    "plugins": listings
                        .iter()
                        .map(|l| {
                            json!({
                                "name": l.name,
                                "version": l.manifest.as_ref().map(|m| m.version.clone()),
                                "description": l.manifest.as_ref().map(|m| m.description.clone()),
                                "git_backed": l.git_backed,
                                "error": l.error,
                            })
                        })
                        .collect::<Vec<_>>(),
                }))
            }
            "plugin_remove" => {
                let name = required_str(arguments, "name")?;
                let remove_credentials = arguments
                    .get("remove_credentials")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let outcome = self
                    .installer
                    .remove(name, remove_credentials)
                    .map_err(|e| HandlerError::fatal(e.to_string()))?;
                Ok(json!({
                    "removed": name,
                    "removed_credentials": outcome.removed_credentials,
                    "requires_restart": outcome.requires_restart,
                }))
            }
            "plugin_update" => {
                let name = required_str(arguments, "name")?;
                let outcome = self
                    .installer
                    .update(name)
                    .await
                    .map_err(|e| HandlerError::fatal(e.to_string()))?;
                Ok(json!({
                    "name": name,
                    "old_version": outcome.old_version,
                    "new_version": outcome.new_version,
                    "new_credentials": outcome.new_credentials,
                }))
            }
            "plugin_configure" => {
                let name = required_str(arguments, "name")?;
                let key = required_str(arguments, "key")?;
                let value = arguments
                    .get("value")
                    .cloned()
                    .ok_or_else(|| HandlerError::fatal("missing argument: value"))?;
                let outcome = self
                    .installer
                    .configure(name, key, value)
                    .map_err(|e| HandlerError::fatal(e.to_string()))?;
                Ok(json!({"name": name, "config": outcome.config}))
            }
            "plugin_verify" => {
                let name = required_str(arguments, "name")?;
                let handler = self.handlers.get(name);
                let outcome = self
                    .installer
                    .verify(name, handler)
                    .await
                    .map_err(|e| HandlerError::fatal(e.to_string()))?;
                Ok(json!({
                    "name": name,
                    "ready": outcome.ready,
                    "credentials": outcome
                        .credentials
                        .iter()
                        .map(|c| json!({"key": c.key, "ok": c.ok, "problem": c.problem}))
                        .collect::<Vec<_>>(),
                    "smoke_ok": outcome.smoke_ok,
                    "smoke_detail": outcome.smoke_detail,
                }))
            }
            other => Err(HandlerError::fatal(format!("installer has no tool: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::FakeGit;

    #[test]
    fn builtin_manifest_is_valid_and_complete() {
        let manifest = installer_manifest();
        let tools: Vec<&str> =
            manifest.provides.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            tools,
            vec![
                "plugin_install",
                "plugin_list",
                "plugin_remove",
                "plugin_update",
                "plugin_configure",
                "plugin_verify",
            ]
        );
    }

    #[tokio::test]
    async fn handler_routes_list_and_unknown_tools() {
        let home = tempfile::tempdir().unwrap();
        let installer = Arc::new(PluginInstaller::new(
            home.path().join("plugins"),
            home.path().join("credentials/plugins"),
            Arc::new(FakeGit::new()),
        ));
        let handler = InstallerHandler::new(installer, HandlerRegistry::new());

        let result = handler.handle("plugin_list", &json!({})).await.unwrap();
        assert_eq!(result["plugins"], json!([]));

        let err = handler.handle("plugin_transmogrify", &json!({})).await.unwrap_err();
        assert!(err.message.contains("no tool"));
    }
}
