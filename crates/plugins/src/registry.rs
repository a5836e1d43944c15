// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Installed-plugin discovery.
//!
//! Enumerates the plugins directory; each subdirectory must carry a
//! `manifest.json`. Broken installs are surfaced with an error instead of
//! being silently dropped so `plugin list` can show them.

use std::path::{Path, PathBuf};

use crate::catalog::{CatalogError, ToolCatalog};
use crate::manifest::PluginManifest;

/// One discovered plugin directory, valid or not.
#[derive(Debug, Clone)]
pub struct PluginListing {
    pub name: String,
    pub path: PathBuf,
    pub manifest: Option<PluginManifest>,
    pub error: Option<String>,
    /// Whether `.git/` is present (installed via git, updatable).
    pub git_backed: bool,
}

/// Discovers plugins on disk and builds catalog snapshots.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    plugins_dir: PathBuf,
}

impl PluginRegistry {
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self { plugins_dir: plugins_dir.into() }
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.plugins_dir.join(name)
    }

    /// Enumerate installed plugins, sorted by name.
    pub fn discover(&self) -> Vec<PluginListing> {
        let mut listings = Vec::new();

        let entries = match std::fs::read_dir(&self.plugins_dir) {
            Ok(entries) => entries,
            // No plugins directory yet means nothing installed.
            Err(_) => return listings,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let git_backed = path.join(".git").is_dir();

            let listing = match PluginManifest::load(&path) {
                Ok(manifest) => PluginListing {
                    name,
                    path,
                    manifest: Some(manifest),
                    error: None,
                    git_backed,
                },
                Err(e) => PluginListing {
                    name,
                    path,
                    manifest: None,
                    error: Some(e.to_string()),
                    git_backed,
                },
            };
            listings.push(listing);
        }

        listings.sort_by(|a, b| a.name.cmp(&b.name));
        listings
    }

    /// Build the third-party catalog snapshot from valid installs.
    ///
    /// Invalid manifests are skipped (they are visible via [`Self::discover`]);
    /// tool name collisions and reserved names fail the whole load.
    pub fn load_catalog(&self) -> Result<ToolCatalog, CatalogError> {
        let plugins: Vec<(String, PluginManifest)> = self
            .discover()
            .into_iter()
            .filter_map(|listing| listing.manifest.map(|m| (listing.name, m)))
            .collect();
        ToolCatalog::build(&plugins, false)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
