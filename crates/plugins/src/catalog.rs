// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tool catalog: an immutable snapshot of every invocable tool.
//!
//! Built once from validated manifests and swapped atomically on plugin
//! reload. Readers clone the `Arc` and see either the old or the new
//! snapshot, never a half-loaded mix.

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use jsonschema::JSONSchema;
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

use crate::builtin::RESERVED_PLUGIN_NAMES;
use crate::manifest::{PluginManifest, RiskLevel};

/// Errors from building a catalog snapshot.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("tool name collision: {tool} provided by both {first} and {second}")]
    Collision { tool: String, first: String, second: String },

    #[error("plugin {0} uses a reserved name")]
    ReservedName(String),

    #[error("tool {tool}: schema does not compile: {detail}")]
    BadSchema { tool: String, detail: String },
}

/// Argument validation failure with a JSON-pointer field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgsError {
    pub field: String,
    pub message: String,
}

/// One invocable tool.
#[derive(Clone)]
pub struct CatalogEntry {
    pub plugin: String,
    pub tool: String,
    pub risk_level: RiskLevel,
    pub allowed_groups: Option<Vec<String>>,
    validator: Arc<JSONSchema>,
}

impl CatalogEntry {
    /// Validate request arguments against the tool's compiled schema.
    ///
    /// Returns the first failure with a JSON-pointer path to the offending
    /// field; for an undeclared property that is the property itself
    /// (e.g. `/extra`).
    pub fn validate_args(&self, arguments: &Value) -> Result<(), ArgsError> {
        let result = self.validator.validate(arguments);
        let Err(mut errors) = result else {
            return Ok(());
        };
        let Some(error) = errors.next() else {
            return Ok(());
        };

        let base = error.instance_path.to_string();
        let field = match &error.kind {
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                let name = unexpected.first().map(String::as_str).unwrap_or_default();
                format!("{base}/{name}")
            }
            ValidationErrorKind::Required { property } => {
                let name = property.as_str().unwrap_or_default();
                format!("{base}/{name}")
            }
            _ => {
                if base.is_empty() {
                    "/".to_string()
                } else {
                    base
                }
            }
        };

        Err(ArgsError { field, message: error.to_string() })
    }
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("plugin", &self.plugin)
            .field("tool", &self.tool)
            .field("risk_level", &self.risk_level)
            .field("allowed_groups", &self.allowed_groups)
            .finish_non_exhaustive()
    }
}

/// Immutable snapshot: tool name → entry.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl ToolCatalog {
    /// Build a snapshot from `(plugin name, manifest)` pairs.
    ///
    /// `builtin` plugins may use reserved names; third-party plugins may
    /// not, and a tool name collision anywhere fails the whole load.
    pub fn build(
        plugins: &[(String, PluginManifest)],
        builtin: bool,
    ) -> Result<Self, CatalogError> {
        let mut entries: HashMap<String, CatalogEntry> = HashMap::new();

        for (plugin_name, manifest) in plugins {
            if !builtin && RESERVED_PLUGIN_NAMES.contains(&plugin_name.as_str()) {
                return Err(CatalogError::ReservedName(plugin_name.clone()));
            }

            for tool in &manifest.provides.tools {
                if let Some(existing) = entries.get(&tool.name) {
                    return Err(CatalogError::Collision {
                        tool: tool.name.clone(),
                        first: existing.plugin.clone(),
                        second: plugin_name.clone(),
                    });
                }

                let validator = JSONSchema::compile(&tool.arguments_schema).map_err(|e| {
                    CatalogError::BadSchema { tool: tool.name.clone(), detail: e.to_string() }
                })?;

                entries.insert(
                    tool.name.clone(),
                    CatalogEntry {
                        plugin: plugin_name.clone(),
                        tool: tool.name.clone(),
                        risk_level: tool.risk_level,
                        allowed_groups: tool.allowed_groups.clone(),
                        validator: Arc::new(validator),
                    },
                );
            }
        }

        Ok(Self { entries })
    }

    /// Merge two snapshots (built-ins + third-party). Collisions fail.
    pub fn merged(self, other: ToolCatalog) -> Result<Self, CatalogError> {
        let mut entries = self.entries;
        for (name, entry) in other.entries {
            if let Some(existing) = entries.get(&name) {
                return Err(CatalogError::Collision {
                    tool: name,
                    first: existing.plugin.clone(),
                    second: entry.plugin.clone(),
                });
            }
            entries.insert(name, entry);
        }
        Ok(Self { entries })
    }

    /// Exact-match lookup; no prefix or substring matching.
    pub fn lookup(&self, tool: &str) -> Option<&CatalogEntry> {
        self.entries.get(tool)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Atomically swappable catalog handle shared by the pipeline.
#[derive(Clone, Default)]
pub struct SharedCatalog {
    current: Arc<RwLock<Arc<ToolCatalog>>>,
}

impl SharedCatalog {
    pub fn new(catalog: ToolCatalog) -> Self {
        Self { current: Arc::new(RwLock::new(Arc::new(catalog))) }
    }

    /// Current snapshot. The clone is cheap and stays consistent for the
    /// caller even if a reload swaps underneath.
    pub fn snapshot(&self) -> Arc<ToolCatalog> {
        self.current.read().clone()
    }

    /// Replace the whole snapshot.
    pub fn swap(&self, catalog: ToolCatalog) {
        *self.current.write() = Arc::new(catalog);
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
