// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL audit file.
//!
//! The dispatcher and pipeline append rejected requests here. Write
//! failures are logged and the entry is dropped; auditing never fails a
//! request.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use carapace_core::{AuditEntry, AuditSink};
use parking_lot::Mutex;
use tracing::warn;

/// Audit sink appending one JSON object per line.
pub struct FileAuditSink {
    file: Mutex<File>,
}

impl FileAuditSink {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, entry: AuditEntry) {
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to serialize audit entry");
                return;
            }
        };
        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{line}") {
            warn!(error = %e, "failed to append audit entry");
        }
    }
}
