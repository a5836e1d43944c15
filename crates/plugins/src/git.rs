// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git capability seam for the installer.
//!
//! `SystemGit` shells out to `git`; tests substitute `FakeGit`. Hardening
//! options (`core.hooksPath=/dev/null`, `core.symlinks=false`) are injected
//! at clone time so hostile repository content is neutered before a single
//! working-tree file exists.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Errors from git subprocess operations.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to exec git: {0}")]
    Unavailable(String),

    #[error("git {op} failed: {detail}")]
    CommandFailed { op: &'static str, detail: String },
}

/// Git operations the installer depends on.
#[async_trait]
pub trait GitOps: Send + Sync {
    /// Shallow, single-branch clone with hook and symlink processing
    /// disabled from the first object checked out.
    async fn clone_hardened(&self, url: &str, dest: &Path) -> Result<(), GitError>;

    async fn fetch(&self, repo: &Path) -> Result<(), GitError>;

    /// Resolve the remote default branch (e.g. `origin/main`).
    async fn default_branch(&self, repo: &Path) -> Result<String, GitError>;

    async fn checkout(&self, repo: &Path, rev: &str) -> Result<(), GitError>;

    /// All local config key names, lowercased by git itself.
    async fn config_keys(&self, repo: &Path) -> Result<Vec<String>, GitError>;

    async fn unset_config(&self, repo: &Path, key: &str) -> Result<(), GitError>;
}

/// Real implementation shelling out to the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct SystemGit;

impl SystemGit {
    pub fn new() -> Self {
        Self
    }
}

async fn run_git(op: &'static str, args: &[&str], cwd: Option<&Path>) -> Result<String, GitError> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    let output = cmd
        .output()
        .await
        .map_err(|e| GitError::Unavailable(e.to_string()))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(GitError::CommandFailed { op, detail })
    }
}

#[async_trait]
impl GitOps for SystemGit {
    async fn clone_hardened(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        let dest_str = dest.display().to_string();
        run_git(
            "clone",
            &[
                "clone",
                "--depth",
                "1",
                "--single-branch",
                "-c",
                "core.hooksPath=/dev/null",
                "-c",
                "core.symlinks=false",
                "--",
                url,
                &dest_str,
            ],
            None,
        )
        .await
        .map(|_| ())
    }

    async fn fetch(&self, repo: &Path) -> Result<(), GitError> {
        run_git("fetch", &["fetch", "origin"], Some(repo)).await.map(|_| ())
    }

    async fn default_branch(&self, repo: &Path) -> Result<String, GitError> {
        let full =
            run_git("symbolic-ref", &["symbolic-ref", "refs/remotes/origin/HEAD"], Some(repo))
                .await?;
        Ok(full.strip_prefix("refs/remotes/").unwrap_or(&full).to_string())
    }

    async fn checkout(&self, repo: &Path, rev: &str) -> Result<(), GitError> {
        run_git("checkout", &["checkout", rev], Some(repo)).await.map(|_| ())
    }

    async fn config_keys(&self, repo: &Path) -> Result<Vec<String>, GitError> {
        let raw =
            run_git("config", &["config", "--local", "--list", "--name-only"], Some(repo)).await?;
        Ok(raw.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
    }

    async fn unset_config(&self, repo: &Path, key: &str) -> Result<(), GitError> {
        run_git("config", &["config", "--local", "--unset-all", key], Some(repo)).await.map(|_| ())
    }
}

/// Scriptable git double for installer tests.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeGit {
    inner: parking_lot::Mutex<FakeGitState>,
}

#[cfg(any(test, feature = "test-support"))]
struct FakeGitState {
    /// Populates the clone destination; defaults to an empty directory.
    on_clone: Box<dyn Fn(&Path) -> std::io::Result<()> + Send>,
    config_keys: Vec<String>,
    unset_keys: Vec<String>,
    default_branch: String,
    fail_clone: Option<String>,
    fetched: Vec<std::path::PathBuf>,
    checkouts: Vec<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeGit {
    fn default() -> Self {
        Self {
            inner: parking_lot::Mutex::new(FakeGitState {
                on_clone: Box::new(|dest| std::fs::create_dir_all(dest)),
                config_keys: Vec::new(),
                unset_keys: Vec::new(),
                default_branch: "origin/main".to_string(),
                fail_clone: None,
                fetched: Vec::new(),
                checkouts: Vec::new(),
            }),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script what a clone writes into the destination directory.
    pub fn on_clone(&self, f: impl Fn(&Path) -> std::io::Result<()> + Send + 'static) {
        self.inner.lock().on_clone = Box::new(f);
    }

    pub fn set_config_keys(&self, keys: &[&str]) {
        self.inner.lock().config_keys = keys.iter().map(|k| k.to_string()).collect();
    }

    pub fn fail_clone(&self, detail: &str) {
        self.inner.lock().fail_clone = Some(detail.to_string());
    }

    pub fn unset_keys(&self) -> Vec<String> {
        self.inner.lock().unset_keys.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.lock().fetched.len()
    }

    pub fn checkouts(&self) -> Vec<String> {
        self.inner.lock().checkouts.clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl GitOps for FakeGit {
    async fn clone_hardened(&self, _url: &str, dest: &Path) -> Result<(), GitError> {
        let mut inner = self.inner.lock();
        if let Some(detail) = inner.fail_clone.take() {
            return Err(GitError::CommandFailed { op: "clone", detail });
        }
        (inner.on_clone)(dest)
            .map_err(|e| GitError::CommandFailed { op: "clone", detail: e.to_string() })
    }

    async fn fetch(&self, repo: &Path) -> Result<(), GitError> {
        self.inner.lock().fetched.push(repo.to_path_buf());
        Ok(())
    }

    async fn default_branch(&self, _repo: &Path) -> Result<String, GitError> {
        Ok(self.inner.lock().default_branch.clone())
    }

    async fn checkout(&self, _repo: &Path, rev: &str) -> Result<(), GitError> {
        self.inner.lock().checkouts.push(rev.to_string());
        Ok(())
    }

    async fn config_keys(&self, _repo: &Path) -> Result<Vec<String>, GitError> {
        Ok(self.inner.lock().config_keys.clone())
    }

    async fn unset_config(&self, _repo: &Path, key: &str) -> Result<(), GitError> {
        let mut inner = self.inner.lock();
        inner.config_keys.retain(|k| k != key);
        inner.unset_keys.push(key.to_string());
        Ok(())
    }
}
