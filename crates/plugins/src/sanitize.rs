// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post-clone hardening of untrusted repositories.
//!
//! Four phases run on every freshly-cloned plugin: hook removal, dangerous
//! config stripping, submodule rejection, symlink rejection. The phases
//! never short-circuit one another, so a repository carrying several
//! hazards reports all of them at once.

use std::path::Path;

use crate::error::PluginError;
use crate::git::GitOps;

/// Result of sanitizing one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub hooks_removed: usize,
    pub config_keys_stripped: Vec<String>,
    pub rejected: bool,
    pub rejection_reasons: Vec<String>,
}

/// Config keys that let a repository execute code or leak credentials on
/// the host. Matched case-insensitively against full key names.
const DENIED_CONFIG_KEYS: &[&str] = &[
    "core.fsmonitor",
    "core.hookspath",
    "core.sshcommand",
    "core.pager",
    "core.editor",
    "diff.external",
    "credential.helper",
];

/// `filter.<name>.clean|smudge|process`, the wildcard subsection.
fn is_denied_filter_key(lower: &str) -> bool {
    let Some(rest) = lower.strip_prefix("filter.") else {
        return false;
    };
    rest.ends_with(".clean") || rest.ends_with(".smudge") || rest.ends_with(".process")
}

fn is_denied_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    DENIED_CONFIG_KEYS.contains(&lower.as_str()) || is_denied_filter_key(&lower)
}

/// Run all four hardening phases on a cloned repository.
pub async fn sanitize_repo(git: &dyn GitOps, dir: &Path) -> Result<SanitizeReport, PluginError> {
    let mut report = SanitizeReport::default();

    // Phase 1: delete every hook. A missing hooks directory is fine.
    let hooks_dir = dir.join(".git").join("hooks");
    if hooks_dir.is_dir() {
        for entry in std::fs::read_dir(&hooks_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                std::fs::remove_file(entry.path())?;
                report.hooks_removed += 1;
            }
        }
    }

    // Phase 2: strip dangerous config keys.
    for key in git.config_keys(dir).await? {
        if is_denied_key(&key) {
            git.unset_config(dir, &key).await?;
            report.config_keys_stripped.push(key);
        }
    }

    // Phase 3: reject submodules.
    if dir.join(".gitmodules").exists() {
        report.rejection_reasons.push("repository declares submodules (.gitmodules)".to_string());
    }

    // Phase 4: reject symlinks anywhere in the working tree.
    let mut symlinks = Vec::new();
    collect_symlinks(dir, dir, &mut symlinks)?;
    for link in symlinks {
        report.rejection_reasons.push(format!("working tree contains symlink: {link}"));
    }

    report.rejected = !report.rejection_reasons.is_empty();
    Ok(report)
}

/// Recursive walk excluding `.git/`, collecting relative symlink paths.
fn collect_symlinks(root: &Path, dir: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.file_name().is_some_and(|n| n == ".git") {
            continue;
        }
        let meta = std::fs::symlink_metadata(&path)?;
        if meta.file_type().is_symlink() {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            out.push(rel.display().to_string());
        } else if meta.is_dir() {
            collect_symlinks(root, &path, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "sanitize_tests.rs"]
mod tests;
