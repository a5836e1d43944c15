// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::*;

#[parameterized(
    configured = { "configured", ContainerStatus::Created },
    created = { "created", ContainerStatus::Created },
    initialized = { "initialized", ContainerStatus::Starting },
    running = { "running", ContainerStatus::Running },
    paused = { "paused", ContainerStatus::Running },
    stopping = { "stopping", ContainerStatus::Stopping },
    stopped = { "stopped", ContainerStatus::Stopped },
    exited = { "exited", ContainerStatus::Stopped },
    unknown = { "unknown", ContainerStatus::Dead },
)]
fn podman_status_table(raw: &str, expected: ContainerStatus) {
    assert_eq!(map_status(raw).unwrap(), expected);
}

#[test]
fn paused_diverges_from_docker_mapping() {
    // Lossy but preserved: see the map_status doc comment.
    assert_eq!(map_status("paused").unwrap(), ContainerStatus::Running);
}

#[test]
fn parses_stopped_state() {
    let raw = r#"{"Status": "stopped", "ExitCode": 1,
        "StartedAt": "2026-03-01T08:00:00Z", "FinishedAt": "2026-03-01T08:05:00Z"}"#;
    let state = parse_state(raw).unwrap();
    assert_eq!(state.status, ContainerStatus::Stopped);
    assert_eq!(state.exit_code, Some(1));
    assert!(state.finished_at.is_some());
}

#[test]
fn missing_status_is_a_parse_error() {
    assert!(matches!(parse_state(r#"{"ExitCode": 0}"#), Err(RuntimeError::Parse(_))));
}
