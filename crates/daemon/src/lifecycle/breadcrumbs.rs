// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted container handles for crash recovery.
//!
//! Every spawned container is recorded here and forgotten on removal. A
//! restarted supervisor loads the file to find orphans from the previous
//! run. Persistence failures are logged, never fatal; the worst case is a
//! leaked container the operator can see with the engine CLI.

use std::path::PathBuf;

use carapace_runtime::ContainerHandle;
use parking_lot::Mutex;
use tracing::warn;

/// Append/remove file of live container handles.
pub struct BreadcrumbFile {
    path: PathBuf,
    entries: Mutex<Vec<ContainerHandle>>,
}

impl BreadcrumbFile {
    /// Load existing breadcrumbs (missing or corrupt file means none).
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self { path, entries: Mutex::new(entries) }
    }

    /// Handles recorded by a previous run (or this one).
    pub fn handles(&self) -> Vec<ContainerHandle> {
        self.entries.lock().clone()
    }

    pub fn record(&self, handle: &ContainerHandle) {
        let mut entries = self.entries.lock();
        entries.push(handle.clone());
        self.persist(&entries);
    }

    pub fn forget(&self, name: &str) {
        let mut entries = self.entries.lock();
        entries.retain(|h| h.name != name);
        self.persist(&entries);
    }

    fn persist(&self, entries: &[ContainerHandle]) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let raw = match serde_json::to_vec_pretty(entries) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "failed to serialize breadcrumbs");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, raw) {
            warn!(path = %self.path.display(), error = %e, "failed to write breadcrumbs");
        }
    }
}
