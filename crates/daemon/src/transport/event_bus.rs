// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus adapter (subscribe side).
//!
//! External bridges connect to a Unix socket and publish single-frame JSON
//! [`EventEnvelope`]s. The supervisor subscribes only to the spawn topics;
//! anything else is dropped here, before the dispatcher sees it.

use std::path::Path;

use carapace_core::EventEnvelope;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::wire::{read_frame, write_frame, ProtocolError};

/// Accepts publisher connections and forwards spawn-topic events.
pub struct EventBusListener {
    listener: UnixListener,
}

impl EventBusListener {
    /// Bind the bus socket, replacing any stale file.
    pub fn bind(path: &Path) -> std::io::Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { listener: UnixListener::bind(path)? })
    }

    /// Accept publishers until cancelled, forwarding events to `event_tx`.
    pub async fn run(self, event_tx: mpsc::Sender<EventEnvelope>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let tx = event_tx.clone();
                            let cancel = cancel.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_publisher(stream, tx, cancel).await {
                                    log_publisher_error(e);
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "event bus accept failed"),
                    }
                }
            }
        }
    }
}

async fn handle_publisher(
    mut stream: UnixStream,
    event_tx: mpsc::Sender<EventEnvelope>,
    cancel: CancellationToken,
) -> Result<(), ProtocolError> {
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            frame = read_frame(&mut stream) => frame?,
        };

        let event: EventEnvelope = match serde_json::from_slice(&frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "dropping malformed event");
                continue;
            }
        };

        // Subscription filter: only the spawn set reaches the dispatcher.
        if !EventEnvelope::is_spawn_topic(&event.topic) {
            debug!(topic = %event.topic, "dropping unsubscribed topic");
            continue;
        }

        if event_tx.send(event).await.is_err() {
            // Dispatcher gone; the supervisor is shutting down.
            return Ok(());
        }
    }
}

fn log_publisher_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("publisher disconnected"),
        other => warn!(error = %other, "publisher connection error"),
    }
}

/// Publish one event to a bus socket (bridges, tests, CLI).
pub async fn publish(path: &Path, event: &EventEnvelope) -> Result<(), ProtocolError> {
    let mut stream = UnixStream::connect(path).await?;
    let frame = serde_json::to_vec(event)
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    write_frame(&mut stream, &frame).await?;
    use tokio::io::AsyncWriteExt;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
