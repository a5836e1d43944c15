// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use carapace_core::test_support::inbound_message_event;
use carapace_core::TOPIC_TASK_TRIGGERED;

use super::*;

struct BusHarness {
    socket: PathBuf,
    event_rx: mpsc::Receiver<EventEnvelope>,
    cancel: CancellationToken,
    _dir: tempfile::TempDir,
}

async fn bus() -> BusHarness {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("events.sock");
    let listener = EventBusListener::bind(&socket).unwrap();
    let (event_tx, event_rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    tokio::spawn(listener.run(event_tx, cancel.clone()));
    BusHarness { socket, event_rx, cancel, _dir: dir }
}

async fn recv(harness: &mut BusHarness) -> Option<EventEnvelope> {
    tokio::time::timeout(Duration::from_secs(1), harness.event_rx.recv()).await.ok().flatten()
}

#[tokio::test]
async fn published_spawn_events_reach_the_channel() {
    let mut h = bus().await;
    let event = inbound_message_event("email", "hello");
    publish(&h.socket, &event).await.unwrap();

    let received = recv(&mut h).await.unwrap();
    assert_eq!(received, event);
    h.cancel.cancel();
}

#[tokio::test]
async fn unsubscribed_topics_are_dropped_at_the_adapter() {
    let mut h = bus().await;
    let mut unrelated = inbound_message_event("email", "hello");
    unrelated.topic = "metrics.tick".to_string();
    publish(&h.socket, &unrelated).await.unwrap();

    let mut task = inbound_message_event("ops", "ignored");
    task.topic = TOPIC_TASK_TRIGGERED.to_string();
    publish(&h.socket, &task).await.unwrap();

    // Only the task event arrives; the unrelated topic never does.
    let received = recv(&mut h).await.unwrap();
    assert_eq!(received.topic, TOPIC_TASK_TRIGGERED);
    h.cancel.cancel();
}

#[tokio::test]
async fn malformed_frames_do_not_kill_the_publisher_connection() {
    let mut h = bus().await;

    let mut stream = tokio::net::UnixStream::connect(&h.socket).await.unwrap();
    super::super::wire::write_frame(&mut stream, b"not json").await.unwrap();
    let event = inbound_message_event("email", "after garbage");
    let frame = serde_json::to_vec(&event).unwrap();
    super::super::wire::write_frame(&mut stream, &frame).await.unwrap();

    let received = recv(&mut h).await.unwrap();
    assert_eq!(received.group, "email");
    h.cancel.cancel();
}

#[tokio::test]
async fn stale_socket_file_is_replaced_on_bind() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("events.sock");
    std::fs::write(&socket, "stale").unwrap();
    EventBusListener::bind(&socket).unwrap();
}
