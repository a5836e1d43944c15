// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin socket: the operator surface of a running supervisor.
//!
//! The CLI connects over a local Unix socket, sends one framed JSON
//! request, and reads one framed reply. This is where pre-approvals are
//! granted and where plugin changes on disk become a new catalog snapshot.

mod protocol;

pub use protocol::{AdminRequest, AdminResponse, SessionStatus};

use std::path::Path;
use std::sync::Arc;

use carapace_core::{SessionId, SystemClock};
use carapace_plugins::{installer_manifest, PluginInstaller, SharedCatalog, ToolCatalog};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::transport::wire::{read_frame, write_frame, ProtocolError};
use crate::lifecycle::ContainerLifecycleManager;
use crate::pipeline::ApprovalStore;

/// Shared context for admin request handlers.
pub struct AdminCtx {
    pub lifecycle: Arc<ContainerLifecycleManager<SystemClock>>,
    pub approvals: ApprovalStore,
    pub catalog: SharedCatalog,
    pub installer: Arc<PluginInstaller>,
}

/// Accepts one-shot admin connections.
pub struct AdminListener {
    listener: UnixListener,
}

impl AdminListener {
    /// Bind the admin socket, replacing any stale file.
    pub fn bind(path: &Path) -> std::io::Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { listener: UnixListener::bind(path)? })
    }

    pub async fn run(self, ctx: Arc<AdminCtx>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let ctx = Arc::clone(&ctx);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, &ctx).await {
                                    log_connection_error(e);
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "admin accept failed"),
                    }
                }
            }
        }
    }
}

/// One request, one reply, close.
async fn handle_connection(mut stream: UnixStream, ctx: &AdminCtx) -> Result<(), ProtocolError> {
    let frame = read_frame(&mut stream).await?;
    let request: AdminRequest = match serde_json::from_slice(&frame) {
        Ok(request) => request,
        Err(e) => {
            let reply = AdminResponse::Error { message: format!("malformed request: {e}") };
            return write_reply(&mut stream, &reply).await;
        }
    };

    debug!(?request, "admin request");
    let reply = handle_request(request, ctx).await;
    write_reply(&mut stream, &reply).await
}

async fn handle_request(request: AdminRequest, ctx: &AdminCtx) -> AdminResponse {
    match request {
        AdminRequest::Ping => AdminResponse::Pong,

        AdminRequest::Status => {
            let mut sessions = Vec::new();
            for session in ctx.lifecycle.get_all() {
                let container_status = ctx
                    .lifecycle
                    .get_status(&session.id)
                    .await
                    .map(|state| format!("{:?}", state.status).to_lowercase());
                sessions.push(SessionStatus {
                    session_id: session.id.to_string(),
                    group: session.group,
                    state: session.state,
                    started_at_ms: session.started_at_ms,
                    container_status,
                });
            }
            AdminResponse::Status { sessions }
        }

        AdminRequest::Approve { correlation_id } => {
            info!(correlation = %correlation_id, "pre-approval granted");
            ctx.approvals.grant(&correlation_id);
            AdminResponse::Approved { correlation_id }
        }

        AdminRequest::SessionStop { session_id } => {
            let stopped = ctx.lifecycle.shutdown(&SessionId::new(session_id)).await;
            AdminResponse::SessionStopped { stopped }
        }

        AdminRequest::ReloadPlugins => match reload_catalog(ctx) {
            Ok(tools) => {
                info!(tools, "plugin catalog reloaded");
                AdminResponse::Reloaded { tools }
            }
            Err(message) => {
                warn!(%message, "catalog reload failed, keeping previous snapshot");
                AdminResponse::Error { message }
            }
        },
    }
}

/// Rebuild the catalog from disk and swap it in. Readers mid-request keep
/// their old snapshot; failure leaves the current one in place.
fn reload_catalog(ctx: &AdminCtx) -> Result<usize, String> {
    let builtins = ToolCatalog::build(&[("installer".to_string(), installer_manifest())], true)
        .map_err(|e| e.to_string())?;
    let third_party = ctx.installer.registry().load_catalog().map_err(|e| e.to_string())?;
    let merged = builtins.merged(third_party).map_err(|e| e.to_string())?;
    let tools = merged.len();
    ctx.catalog.swap(merged);
    Ok(tools)
}

async fn write_reply(stream: &mut UnixStream, reply: &AdminResponse) -> Result<(), ProtocolError> {
    let frame = serde_json::to_vec(reply).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    write_frame(stream, &frame).await?;
    use tokio::io::AsyncWriteExt;
    stream.flush().await?;
    Ok(())
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("admin client disconnected"),
        other => warn!(error = %other, "admin connection error"),
    }
}

/// Send one admin request to a supervisor socket and read the reply.
/// Used by the CLI.
pub async fn request(path: &Path, request: &AdminRequest) -> Result<AdminResponse, ProtocolError> {
    let mut stream = UnixStream::connect(path).await?;
    let frame =
        serde_json::to_vec(request).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    write_frame(&mut stream, &frame).await?;
    use tokio::io::AsyncWriteExt;
    stream.flush().await?;

    let reply = read_frame(&mut stream).await?;
    serde_json::from_slice(&reply).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
