// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container lifecycle: spawn, shutdown, orphan cleanup.
//!
//! The manager uniquely owns every [`ContainerHandle`] it creates. Other
//! components hold session ids and consult the registry; nothing else ever
//! stops or removes a container.

mod api_mode;
mod breadcrumbs;
mod credential;

pub use breadcrumbs::BreadcrumbFile;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use carapace_core::{Clock, ConnectionIdentity, Session, SessionId, SessionState};
use carapace_runtime::{ContainerHandle, ContainerRuntime, ContainerState, RunOptions, RuntimeError};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::ApiModeConfig;
use crate::dispatch::AgentSpawner;
use crate::registry::SessionRegistry;

/// Env var carrying the hex-encoded connection identity into the container.
pub const IDENTITY_ENV: &str = "CARAPACE_CONNECTION_IDENTITY";

/// Env var carrying the session's group.
pub const GROUP_ENV: &str = "CARAPACE_GROUP";

/// Well-known request env names mapped to container-internal names.
const ENV_ALIASES: &[(&str, &str)] = &[
    ("resume-session", "CARAPACE_RESUME_SESSION"),
    ("task-prompt", "CARAPACE_TASK_PROMPT"),
];

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("spawn provisioning failed: {0}")]
    Provision(#[from] std::io::Error),

    #[error("agent not ready: {0}")]
    NotReady(String),
}

/// Settings the manager needs for every spawn.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub image: String,
    pub container_prefix: String,
    pub graceful_stop: Duration,
    /// Host path of the request-channel socket, mounted into the container.
    pub request_socket: PathBuf,
    pub workspace_dir: Option<PathBuf>,
    pub skills_dir: Option<PathBuf>,
    pub group_state_dir: Option<PathBuf>,
    pub breadcrumb_path: PathBuf,
    pub api_mode: Option<ApiModeConfig>,
}

/// One spawn request from the dispatcher.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub group: String,
    pub env: BTreeMap<String, String>,
}

/// Summary of an orphan cleanup pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OrphanReport {
    pub killed: usize,
    pub removed: usize,
    pub skipped: usize,
}

struct ManagedContainer {
    handle: ContainerHandle,
    // Holds the API key temp dir alive for the container's lifetime.
    _api_dir: Option<tempfile::TempDir>,
}

/// Owns container handles and drives their lifecycle.
pub struct ContainerLifecycleManager<C: Clock> {
    runtime: Arc<dyn ContainerRuntime>,
    registry: SessionRegistry,
    config: LifecycleConfig,
    clock: C,
    managed: Mutex<HashMap<SessionId, ManagedContainer>>,
    breadcrumbs: BreadcrumbFile,
    api_port_counter: AtomicU16,
}

impl<C: Clock> ContainerLifecycleManager<C> {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        registry: SessionRegistry,
        config: LifecycleConfig,
        clock: C,
    ) -> Self {
        let breadcrumbs = BreadcrumbFile::load(&config.breadcrumb_path);
        let base_port = config.api_mode.as_ref().map(|a| a.base_port).unwrap_or(9300);
        Self {
            runtime,
            registry,
            config,
            clock,
            managed: Mutex::new(HashMap::new()),
            breadcrumbs,
            api_port_counter: AtomicU16::new(base_port),
        }
    }

    /// Handles recorded by a previous run, for startup orphan cleanup.
    pub fn previous_run_handles(&self) -> Vec<ContainerHandle> {
        self.breadcrumbs.handles()
    }

    /// Spawn an agent container and record its session.
    pub async fn spawn(&self, request: SpawnRequest) -> Result<Session, SpawnError> {
        let identity = ConnectionIdentity::generate();
        let name = format!(
            "{}-{}-{}",
            self.config.container_prefix,
            request.group,
            SessionId::generate().short(6)
        );

        let mut options = RunOptions::new(&self.config.image)
            .name(&name)
            .env(IDENTITY_ENV, identity.to_hex())
            .env(GROUP_ENV, &request.group);

        // Map well-known request env names; pass through anything that
        // already looks like an env var name.
        for (key, value) in &request.env {
            match ENV_ALIASES.iter().find(|(alias, _)| alias == key) {
                Some((_, internal)) => options = options.env(*internal, value),
                None if is_env_name(key) => options = options.env(key, value),
                None => warn!(key = %key, "ignoring unknown spawn env key"),
            }
        }

        if let Some(token) = credential::resolve() {
            options = options.env(credential::AGENT_TOKEN_ENV, token);
        }

        if let Some(ref workspace) = self.config.workspace_dir {
            options = options.volume(workspace, "/workspace", false);
        }
        if let Some(ref skills) = self.config.skills_dir {
            options = options.volume(skills, "/skills", true);
        }
        if let Some(ref state_root) = self.config.group_state_dir {
            let group_dir = state_root.join(&request.group);
            std::fs::create_dir_all(&group_dir)?;
            options = options.volume(group_dir, "/state", false);
        }

        // API mode replaces the socket mount with a published port and a
        // one-time key; otherwise the request socket is bind-mounted.
        let mut api_provision = None;
        if let Some(ref api) = self.config.api_mode {
            let host_port = self.api_port_counter.fetch_add(1, Ordering::Relaxed);
            let provision = api_mode::provision(host_port)?;
            options = options
                .network(&api.network)
                .port(host_port, api.container_port)
                .volume(provision.key_dir.path(), api_mode::API_KEY_MOUNT, true)
                .env("CARAPACE_API_PORT", api.container_port.to_string());
            api_provision = Some(provision);
        } else {
            options = options.socket(&self.config.request_socket, "/run/carapace/request.sock");
        }

        let started = std::time::Instant::now();
        let handle = self.runtime.run(&options).await?;
        self.breadcrumbs.record(&handle);

        // API mode: the container only counts once its health endpoint
        // answers; tear everything down on a failed probe.
        if let Some(ref provision) = api_provision {
            let addr = format!("127.0.0.1:{}", provision.host_port);
            let result = api_mode::poll_health(
                &addr,
                &provision.api_key,
                crate::env::ready_poll_interval(),
                crate::env::ready_poll_attempts(),
            )
            .await;
            if let Err(reason) = result {
                warn!(container = %name, %reason, "api-mode agent failed readiness, tearing down");
                let _ = self.runtime.kill(&handle).await;
                if let Err(e) = self.runtime.remove(&handle).await {
                    if !e.is_not_found() {
                        warn!(container = %name, error = %e, "failed to remove unready container");
                    }
                }
                self.breadcrumbs.forget(&handle.name);
                return Err(SpawnError::NotReady(reason));
            }
        }

        let mut session =
            Session::new(&request.group, handle.id.clone(), identity, self.clock.epoch_ms());
        session.state = SessionState::Running;

        self.registry.insert(session.clone());
        self.managed.lock().insert(
            session.id.clone(),
            ManagedContainer { handle, _api_dir: api_provision.map(|p| p.key_dir) },
        );

        info!(
            session = %session.id,
            group = %request.group,
            container = %name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "agent container spawned"
        );
        Ok(session)
    }

    /// Graceful-then-forced shutdown of one session.
    ///
    /// Returns `false` when the session was already gone; with concurrent
    /// callers exactly one observes `true`.
    pub async fn shutdown(&self, id: &SessionId) -> bool {
        // Claiming the handle is the linearization point for concurrent
        // shutdowns.
        let Some(container) = self.managed.lock().remove(id) else {
            return false;
        };
        self.registry.set_state(id, SessionState::ShuttingDown);

        let graceful = self.config.graceful_stop;
        let stop = self.runtime.stop(&container.handle, Some(graceful));
        match tokio::time::timeout(graceful, stop).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(session = %id, error = %e, "graceful stop failed, killing");
                if let Err(e) = self.runtime.kill(&container.handle).await {
                    if !e.is_not_found() {
                        warn!(session = %id, error = %e, "kill failed");
                    }
                }
            }
            Err(_) => {
                info!(session = %id, timeout_ms = graceful.as_millis() as u64, "stop timed out, killing");
                if let Err(e) = self.runtime.kill(&container.handle).await {
                    if !e.is_not_found() {
                        warn!(session = %id, error = %e, "kill failed");
                    }
                }
            }
        }

        // Remove always runs; a failure leaves an engine-level leftover but
        // the session is gone either way.
        if let Err(e) = self.runtime.remove(&container.handle).await {
            if !e.is_not_found() {
                warn!(session = %id, error = %e, "container remove failed");
            }
        }

        self.breadcrumbs.forget(&container.handle.name);
        self.registry.remove(id);
        info!(session = %id, "session shut down");
        true
    }

    /// Shut down every tracked session concurrently. Never fails.
    pub async fn shutdown_all(self: &Arc<Self>) {
        let ids: Vec<SessionId> = self.managed.lock().keys().cloned().collect();
        if ids.is_empty() {
            return;
        }
        info!(count = ids.len(), "shutting down all sessions");

        let mut tasks = JoinSet::new();
        for id in ids {
            let manager = Arc::clone(self);
            tasks.spawn(async move { manager.shutdown(&id).await });
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "shutdown task panicked");
            }
        }
    }

    /// Clean up containers from a previous run.
    ///
    /// Skips anything currently managed; inspects each handle and kills
    /// running orphans before removing them.
    pub async fn cleanup_orphans(&self, handles: &[ContainerHandle]) -> OrphanReport {
        let managed_names: HashSet<String> =
            self.managed.lock().values().map(|m| m.handle.name.clone()).collect();
        let mut report = OrphanReport::default();

        for handle in handles {
            if managed_names.contains(&handle.name) {
                continue;
            }
            match self.runtime.inspect(handle).await {
                Err(e) if e.is_not_found() => {
                    self.breadcrumbs.forget(&handle.name);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(container = %handle.name, error = %e, "orphan inspect failed");
                    report.skipped += 1;
                }
                Ok(state) if state.status.is_running() => {
                    info!(container = %handle.name, "killing running orphan");
                    if let Err(e) = self.runtime.kill(handle).await {
                        warn!(container = %handle.name, error = %e, "orphan kill failed");
                    }
                    if let Err(e) = self.runtime.remove(handle).await {
                        if !e.is_not_found() {
                            warn!(container = %handle.name, error = %e, "orphan remove failed");
                        }
                    }
                    self.breadcrumbs.forget(&handle.name);
                    report.killed += 1;
                }
                Ok(_) => {
                    if let Err(e) = self.runtime.remove(handle).await {
                        if !e.is_not_found() {
                            warn!(container = %handle.name, error = %e, "orphan remove failed");
                        }
                    }
                    self.breadcrumbs.forget(&handle.name);
                    report.removed += 1;
                }
            }
        }

        if report != OrphanReport::default() {
            info!(
                killed = report.killed,
                removed = report.removed,
                skipped = report.skipped,
                "orphan cleanup complete"
            );
        }
        report
    }

    /// Container state for one session, or `None` if unknown/gone.
    pub async fn get_status(&self, id: &SessionId) -> Option<ContainerState> {
        let handle = self.managed.lock().get(id).map(|m| m.handle.clone())?;
        self.runtime.inspect(&handle).await.ok()
    }

    /// All tracked sessions, oldest first.
    pub fn get_all(&self) -> Vec<Session> {
        self.registry.all()
    }
}

/// Uppercase env-var-shaped keys pass through unchanged.
fn is_env_name(key: &str) -> bool {
    !key.is_empty()
        && key.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && key.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[async_trait]
impl<C: Clock> AgentSpawner for ContainerLifecycleManager<C> {
    async fn spawn_agent(
        &self,
        group: &str,
        env: BTreeMap<String, String>,
    ) -> Result<SessionId, String> {
        self.spawn(SpawnRequest { group: group.to_string(), env })
            .await
            .map(|session| session.id)
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
