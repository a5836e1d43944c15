// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request channel adapter (router side).
//!
//! Agents connect to a Unix socket and exchange
//! `[identity][empty][body]` messages. The first message binds the
//! connection to a session: the identity frame must match a registered
//! session's connection identity (possession of the random value is the
//! capability). After binding, a mismatched identity frame closes the
//! connection.
//!
//! Requests on one connection are processed strictly in wire order; the
//! response for request R is written before the next request is read, which
//! gives the per-identity FIFO guarantee.

use std::path::Path;
use std::sync::Arc;

use carapace_core::{Clock, ConnectionIdentity, RequestEnvelope, ResponseEnvelope};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::wire::{read_message, write_message, ProtocolError};
use crate::pipeline::RequestPipeline;
use crate::registry::SessionRegistry;

/// Accepts agent connections and feeds the pipeline.
pub struct RequestChannel {
    listener: UnixListener,
}

impl RequestChannel {
    /// Bind the request socket, replacing any stale file.
    pub fn bind(path: &Path) -> std::io::Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { listener: UnixListener::bind(path)? })
    }

    /// Accept agents until cancelled.
    pub async fn run<C: Clock>(
        self,
        pipeline: Arc<RequestPipeline<C>>,
        registry: SessionRegistry,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let pipeline = Arc::clone(&pipeline);
                            let registry = registry.clone();
                            let cancel = cancel.clone();
                            tokio::spawn(async move {
                                if let Err(e) =
                                    handle_agent(stream, pipeline, registry, cancel).await
                                {
                                    log_agent_error(e);
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "request channel accept failed"),
                    }
                }
            }
        }
    }
}

async fn handle_agent<C: Clock>(
    mut stream: UnixStream,
    pipeline: Arc<RequestPipeline<C>>,
    registry: SessionRegistry,
    cancel: CancellationToken,
) -> Result<(), ProtocolError> {
    // The identity this connection is bound to, fixed by the first valid
    // message.
    let mut bound: Option<ConnectionIdentity> = None;

    loop {
        let (identity_frame, body) = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            message = read_message(&mut stream) => message?,
        };

        let identity = match ConnectionIdentity::from_frame(&identity_frame) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "closing connection with malformed identity frame");
                return Ok(());
            }
        };

        match bound {
            None => {
                // Bind: the identity must belong to a live session.
                if registry.by_identity(&identity).is_none() {
                    warn!(identity = %identity, "rejecting connection for unknown identity");
                    return Ok(());
                }
                bound = Some(identity);
            }
            Some(expected) if expected != identity => {
                warn!(
                    bound = %expected,
                    presented = %identity,
                    "identity changed mid-connection, closing"
                );
                return Ok(());
            }
            Some(_) => {}
        }

        let request: RequestEnvelope = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                // Without a correlation id there is nothing to address a
                // reply to; drop the connection.
                warn!(error = %e, "closing connection after malformed request");
                return Ok(());
            }
        };

        debug!(tool = %request.tool, correlation = %request.correlation_id, "request received");
        let response: ResponseEnvelope = pipeline.handle(&identity, request).await;

        let body = serde_json::to_vec(&response)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        write_message(&mut stream, &identity_frame, &body).await?;
    }
}

fn log_agent_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("agent disconnected"),
        other => warn!(error = %other, "agent connection error"),
    }
}

#[cfg(test)]
#[path = "request_channel_tests.rs"]
mod tests;
