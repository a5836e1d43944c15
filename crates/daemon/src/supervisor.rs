// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup sequencing, the engine loop, and graceful shutdown.
//!
//! Startup order: lock file → audit sink → plugin catalogs → lifecycle
//! manager → orphan cleanup → transports → engine loop. Shutdown reverses
//! it: cancel transports, shut down all sessions, release the lock.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use carapace_core::{AuditSink, EventEnvelope, SystemClock};
use carapace_plugins::{
    installer_manifest, CatalogError, HandlerRegistry, InstallerHandler, PluginInstaller,
    SharedCatalog, SystemGit, ToolCatalog,
};
use carapace_runtime::ContainerRuntime;
use fs2::FileExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::admin::{AdminCtx, AdminListener};
use crate::audit::FileAuditSink;
use crate::config::{ConfigError, SupervisorConfig};
use crate::dispatch::EventDispatcher;
use crate::lifecycle::{ContainerLifecycleManager, LifecycleConfig};
use crate::pipeline::{ApprovalStore, RequestPipeline};
use crate::registry::SessionRegistry;
use crate::transport::{EventBusListener, RequestChannel};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to acquire lock: supervisor already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("container engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("plugin catalog failed to load: {0}")]
    Catalog(#[from] CatalogError),

    #[error("failed to bind {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A running supervisor and the handles needed to stop it.
pub struct Supervisor {
    pub registry: SessionRegistry,
    pub lifecycle: Arc<ContainerLifecycleManager<SystemClock>>,
    pub approvals: ApprovalStore,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    event_socket: PathBuf,
    request_socket: PathBuf,
    admin_socket: PathBuf,
    lock_path: PathBuf,
    // Held for the exclusive advisory lock; released on drop.
    _lock_file: File,
}

impl Supervisor {
    /// Bring the whole supervisor up. Fatal errors here abort startup;
    /// after this returns the daemon only logs and continues.
    pub async fn start(
        config: SupervisorConfig,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Result<Supervisor, SupervisorError> {
        let state_dir = config.resolved_state_dir()?;
        let home_dir = config.resolved_home_dir()?;
        std::fs::create_dir_all(&state_dir)?;
        std::fs::create_dir_all(&home_dir)?;

        // One supervisor per state dir. The lock file doubles as the pid
        // file for `carapace stop`.
        let lock_path = state_dir.join("carapaced.lock");
        let mut lock_file = File::create(&lock_path)?;
        lock_file.try_lock_exclusive().map_err(SupervisorError::LockFailed)?;
        {
            use std::io::Write;
            let _ = writeln!(lock_file, "{}", std::process::id());
        }

        if !runtime.is_available().await {
            return Err(SupervisorError::EngineUnavailable(config.engine.clone()));
        }
        match runtime.version().await {
            Ok(version) => info!(engine = %config.engine, %version, "container engine ready"),
            Err(e) => warn!(error = %e, "engine version probe failed"),
        }

        // Pre-pull the agent image so the first spawn does not eat the
        // download. Failures are non-fatal; spawn surfaces them with a
        // retriable error when the pull was transient.
        match runtime.image_exists(&config.image).await {
            Ok(true) => {}
            Ok(false) => {
                info!(image = %config.image, "agent image missing, pulling");
                if let Err(e) = runtime.pull(&config.image).await {
                    warn!(image = %config.image, error = %e, "image pull failed");
                }
            }
            Err(e) => warn!(error = %e, "image probe failed"),
        }

        let audit: Arc<dyn AuditSink> =
            Arc::new(FileAuditSink::open(&state_dir.join("audit.jsonl"))?);

        // Plugin surface: built-ins plus whatever is installed on disk.
        let plugins_dir = home_dir.join("plugins");
        let credentials_dir = home_dir.join("credentials").join("plugins");
        let installer = Arc::new(PluginInstaller::new(
            &plugins_dir,
            &credentials_dir,
            Arc::new(SystemGit::new()),
        ));
        let builtin_catalog =
            ToolCatalog::build(&[("installer".to_string(), installer_manifest())], true)?;
        let third_party = installer.registry().load_catalog()?;
        let catalog = SharedCatalog::new(builtin_catalog.merged(third_party)?);
        info!(tools = catalog.snapshot().len(), "tool catalog loaded");

        let handlers = HandlerRegistry::new();
        handlers.register(
            "installer",
            Arc::new(InstallerHandler::new(Arc::clone(&installer), handlers.clone())),
        );

        let registry = SessionRegistry::new();
        let request_socket = state_dir.join("request.sock");
        let event_socket = state_dir.join("events.sock");
        let admin_socket = state_dir.join("admin.sock");

        let lifecycle = Arc::new(ContainerLifecycleManager::new(
            Arc::clone(&runtime),
            registry.clone(),
            LifecycleConfig {
                image: config.image.clone(),
                container_prefix: config.container_prefix.clone(),
                graceful_stop: config.graceful_stop(),
                request_socket: request_socket.clone(),
                workspace_dir: config.workspace_dir.clone(),
                skills_dir: config.skills_dir.clone(),
                group_state_dir: config.group_state_dir.clone(),
                breadcrumb_path: state_dir.join("containers.json"),
                api_mode: config.api_mode.clone(),
            },
            SystemClock,
        ));

        // Recover from the previous run before accepting anything new.
        let orphans = lifecycle.previous_run_handles();
        if !orphans.is_empty() {
            info!(count = orphans.len(), "cleaning up containers from previous run");
            lifecycle.cleanup_orphans(&orphans).await;
        }

        let approvals = ApprovalStore::new();
        let pipeline = Arc::new(RequestPipeline::new(
            registry.clone(),
            catalog.clone(),
            handlers,
            config.rate_limit,
            approvals.clone(),
            Arc::clone(&audit),
            config.confirmation_wait(),
            SystemClock,
        ));

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        // Request channel: agents → pipeline.
        let channel = RequestChannel::bind(&request_socket)
            .map_err(|e| SupervisorError::BindFailed(request_socket.clone(), e))?;
        tasks.push(tokio::spawn(channel.run(
            Arc::clone(&pipeline),
            registry.clone(),
            cancel.clone(),
        )));

        // Event bus → dispatcher engine loop.
        let bus = EventBusListener::bind(&event_socket)
            .map_err(|e| SupervisorError::BindFailed(event_socket.clone(), e))?;
        let (event_tx, event_rx) = mpsc::channel::<EventEnvelope>(64);
        tasks.push(tokio::spawn(bus.run(event_tx, cancel.clone())));

        let dispatcher = EventDispatcher::new(
            config.groups.clone(),
            config.max_sessions_per_group,
            registry.clone(),
            lifecycle.clone() as Arc<dyn crate::dispatch::AgentSpawner>,
            audit,
            SystemClock,
        );
        tasks.push(tokio::spawn(engine_loop(dispatcher, event_rx, cancel.clone())));

        // Admin surface: approvals, status, plugin reload.
        let admin = AdminListener::bind(&admin_socket)
            .map_err(|e| SupervisorError::BindFailed(admin_socket.clone(), e))?;
        let admin_ctx = Arc::new(AdminCtx {
            lifecycle: Arc::clone(&lifecycle),
            approvals: approvals.clone(),
            catalog,
            installer,
        });
        tasks.push(tokio::spawn(admin.run(admin_ctx, cancel.clone())));

        info!(
            state_dir = %state_dir.display(),
            groups = ?config.groups,
            "supervisor ready"
        );
        Ok(Supervisor {
            registry,
            lifecycle,
            approvals,
            cancel,
            tasks,
            event_socket,
            request_socket,
            admin_socket,
            lock_path,
            _lock_file: lock_file,
        })
    }

    /// Graceful shutdown: stop accepting, drain sessions, release files.
    pub async fn shutdown(self) {
        info!("shutting down supervisor");
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "transport task panicked during shutdown");
            }
        }

        self.lifecycle.shutdown_all().await;

        for path in [&self.event_socket, &self.request_socket, &self.admin_socket, &self.lock_path] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "failed to remove file");
                }
            }
        }
        info!("supervisor shutdown complete");
    }
}

/// Engine loop: every bus event goes through the dispatcher; outcomes are
/// logged, never thrown.
async fn engine_loop(
    dispatcher: EventDispatcher<SystemClock>,
    mut event_rx: mpsc::Receiver<EventEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => return,
            event = event_rx.recv() => match event {
                Some(event) => event,
                None => return,
            },
        };

        let result = dispatcher.dispatch(&event).await;
        tracing::debug!(topic = %event.topic, group = %event.group, ?result, "event dispatched");
    }
}
