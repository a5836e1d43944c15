// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin manifest: the declared contract of an installed plugin.
//!
//! Every manifest is validated against a fixed JSON Schema before it is
//! deserialized, so a malformed manifest from an untrusted repository is
//! rejected with a field path instead of a serde error deep in a struct.

use std::path::Path;
use std::sync::OnceLock;

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::PluginError;

/// Risk classification of a tool; `High` requires a pre-approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// One tool a plugin provides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub risk_level: RiskLevel,
    /// JSON Schema for `arguments`; must carry `additionalProperties: false`.
    pub arguments_schema: Value,
    /// When present, only sessions in these groups may invoke the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_groups: Option<Vec<String>>,
}

/// A credential the plugin needs installed under
/// `<home>/credentials/plugins/<name>/<key>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSpec {
    pub key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Provides {
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstallSpec {
    #[serde(default)]
    pub credentials: Vec<CredentialSpec>,
}

/// Parsed, schema-validated `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub description: String,
    pub version: String,
    pub app_compat: String,
    pub author: Author,
    pub provides: Provides,
    #[serde(default)]
    pub subscribes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<Value>,
}

impl PluginManifest {
    /// Read and validate `manifest.json` from a plugin directory.
    pub fn load(plugin_dir: &Path) -> Result<Self, PluginError> {
        let path = plugin_dir.join("manifest.json");
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            PluginError::ManifestInvalid(format!("cannot read manifest.json: {e}"))
        })?;
        Self::parse(&raw)
    }

    /// Parse and validate a manifest document.
    pub fn parse(raw: &str) -> Result<Self, PluginError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| PluginError::ManifestInvalid(format!("not valid JSON: {e}")))?;

        validate_against_schema(&value)?;

        let manifest: PluginManifest = serde_json::from_value(value)
            .map_err(|e| PluginError::ManifestInvalid(e.to_string()))?;

        for tool in &manifest.provides.tools {
            validate_tool_schema(tool)?;
        }

        Ok(manifest)
    }

    /// Keys of credentials this plugin declares.
    pub fn credential_keys(&self) -> Vec<&str> {
        self.install
            .as_ref()
            .map(|i| i.credentials.iter().map(|c| c.key.as_str()).collect())
            .unwrap_or_default()
    }
}

fn validate_against_schema(value: &Value) -> Result<(), PluginError> {
    let schema = manifest_schema();
    if let Err(mut errors) = schema.validate(value) {
        // Report the first error with its instance path; one actionable
        // failure beats a wall of cascading ones.
        if let Some(error) = errors.next() {
            return Err(PluginError::ManifestInvalid(format!(
                "{} (at {})",
                error,
                error.instance_path
            )));
        }
    }
    Ok(())
}

/// Every tool argument schema must be an object schema that rejects
/// undeclared fields, and must itself compile.
fn validate_tool_schema(tool: &ToolSpec) -> Result<(), PluginError> {
    let schema = &tool.arguments_schema;
    if !schema.is_object() {
        return Err(PluginError::ManifestInvalid(format!(
            "tool {}: arguments_schema must be an object",
            tool.name
        )));
    }
    if schema.get("additionalProperties") != Some(&Value::Bool(false)) {
        return Err(PluginError::ManifestInvalid(format!(
            "tool {}: arguments_schema must set additionalProperties: false",
            tool.name
        )));
    }
    JSONSchema::compile(schema).map_err(|e| {
        PluginError::ManifestInvalid(format!("tool {}: schema does not compile: {e}", tool.name))
    })?;
    Ok(())
}

/// The fixed schema all manifests must satisfy.
fn manifest_schema() -> &'static JSONSchema {
    static SCHEMA: OnceLock<JSONSchema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let schema = json!({
            "type": "object",
            "required": ["description", "version", "app_compat", "author", "provides"],
            "properties": {
                "description": {"type": "string", "minLength": 1},
                "version": {"type": "string", "minLength": 1},
                "app_compat": {"type": "string", "minLength": 1},
                "author": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {"name": {"type": "string", "minLength": 1}},
                },
                "subscribes": {"type": "array", "items": {"type": "string"}},
                "provides": {
                    "type": "object",
                    "required": ["tools"],
                    "properties": {
                        "tools": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["name", "description", "risk_level", "arguments_schema"],
                                "properties": {
                                    "name": {"type": "string", "pattern": "^[a-z][a-z0-9_]*$"},
                                    "description": {"type": "string"},
                                    "risk_level": {"enum": ["low", "medium", "high"]},
                                    "arguments_schema": {"type": "object"},
                                    "allowed_groups": {
                                        "type": "array",
                                        "items": {"type": "string"},
                                    },
                                },
                            },
                        },
                        "channels": {"type": "array", "items": {"type": "string"}},
                    },
                },
                "install": {
                    "type": "object",
                    "properties": {
                        "credentials": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["key"],
                                "properties": {
                                    "key": {"type": "string", "pattern": "^[a-zA-Z0-9_.-]+$"},
                                    "description": {"type": "string"},
                                    "required": {"type": "boolean"},
                                },
                            },
                        },
                    },
                },
                "config_schema": {"type": "object"},
            },
        });
        // The schema is a compile-time constant; failure is a bug.
        #[allow(clippy::expect_used)]
        let compiled = JSONSchema::compile(&schema).expect("manifest schema compiles");
        compiled
    })
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
