// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use carapace_core::FakeClock;
use carapace_runtime::{ContainerState, FakeRuntime, RuntimeCall};

use super::*;

struct Harness {
    manager: Arc<ContainerLifecycleManager<FakeClock>>,
    runtime: FakeRuntime,
    registry: SessionRegistry,
    _state: tempfile::TempDir,
}

fn harness() -> Harness {
    let state = tempfile::tempdir().unwrap();
    let runtime = FakeRuntime::new();
    let registry = SessionRegistry::new();
    let config = LifecycleConfig {
        image: "agent:latest".to_string(),
        container_prefix: "cara".to_string(),
        graceful_stop: Duration::from_millis(500),
        request_socket: state.path().join("request.sock"),
        workspace_dir: None,
        skills_dir: None,
        group_state_dir: None,
        breadcrumb_path: state.path().join("containers.json"),
        api_mode: None,
    };
    let manager = Arc::new(ContainerLifecycleManager::new(
        Arc::new(runtime.clone()),
        registry.clone(),
        config,
        FakeClock::new(),
    ));
    Harness { manager, runtime, registry, _state: state }
}

fn spawn_request(group: &str) -> SpawnRequest {
    SpawnRequest { group: group.to_string(), env: BTreeMap::new() }
}

// ── spawn ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn spawn_records_session_and_identity_env() {
    let h = harness();
    let session = h.manager.spawn(spawn_request("email")).await.unwrap();

    assert_eq!(session.group, "email");
    assert_eq!(session.state, SessionState::Running);
    assert_eq!(h.registry.by_id(&session.id).unwrap().id, session.id);
    assert!(h.registry.by_identity(&session.connection_identity).is_some());

    let calls = h.runtime.calls();
    let RuntimeCall::Run { image, name, env } = &calls[0] else {
        panic!("first call should be Run, got {calls:?}");
    };
    assert_eq!(image, "agent:latest");
    assert!(name.starts_with("cara-email-"));
    assert_eq!(
        env.get(IDENTITY_ENV).map(String::as_str),
        Some(session.connection_identity.to_hex().as_str()),
        "hex identity must be injected"
    );
    assert_eq!(env.get(GROUP_ENV).map(String::as_str), Some("email"));
}

#[tokio::test]
async fn spawn_maps_well_known_env_aliases() {
    let h = harness();
    let mut env = BTreeMap::new();
    env.insert("resume-session".to_string(), "ses-old".to_string());
    env.insert("CARAPACE_EVENT_SOURCE".to_string(), "imap".to_string());
    env.insert("lowercase-noise".to_string(), "x".to_string());

    h.manager.spawn(SpawnRequest { group: "email".to_string(), env }).await.unwrap();

    let calls = h.runtime.calls();
    let RuntimeCall::Run { env, .. } = &calls[0] else {
        panic!("first call should be Run");
    };
    assert_eq!(env.get("CARAPACE_RESUME_SESSION").map(String::as_str), Some("ses-old"));
    assert_eq!(env.get("CARAPACE_EVENT_SOURCE").map(String::as_str), Some("imap"));
    assert!(!env.contains_key("resume-session"), "alias keys are mapped, not copied");
    assert!(!env.contains_key("lowercase-noise"), "unknown lowercase keys are dropped");
}

#[test]
fn env_name_detection() {
    assert!(is_env_name("CARAPACE_EVENT_SOURCE"));
    assert!(is_env_name("X1_Y"));
    assert!(!is_env_name("resume-session"));
    assert!(!is_env_name("lower"));
    assert!(!is_env_name(""));
    assert!(!is_env_name("1LEADING"));
}

#[tokio::test]
async fn failed_run_leaves_no_session() {
    let h = harness();
    h.runtime.fail_next_run("image not found");

    let err = h.manager.spawn(spawn_request("email")).await.unwrap_err();
    assert!(matches!(err, SpawnError::Runtime(_)));
    assert!(h.registry.is_empty());
    assert!(h.manager.previous_run_handles().is_empty(), "no breadcrumb for a failed run");
}

#[tokio::test]
async fn sessions_never_share_connection_identity() {
    let h = harness();
    let a = h.manager.spawn(spawn_request("email")).await.unwrap();
    let b = h.manager.spawn(spawn_request("email")).await.unwrap();
    assert_ne!(a.connection_identity, b.connection_identity);
}

// ── shutdown ────────────────────────────────────────────────────────────

#[tokio::test]
async fn graceful_shutdown_stops_and_removes() {
    let h = harness();
    let session = h.manager.spawn(spawn_request("email")).await.unwrap();

    assert!(h.manager.shutdown(&session.id).await);
    assert!(h.registry.by_id(&session.id).is_none());
    assert!(h.manager.get_all().is_empty());

    let calls = h.runtime.calls();
    assert!(calls.iter().any(|c| matches!(c, RuntimeCall::Stop { .. })));
    assert!(calls.iter().any(|c| matches!(c, RuntimeCall::Remove(_))));
    assert_eq!(h.runtime.kill_count(&container_name(&calls)), 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_stop_escalates_to_exactly_one_kill() {
    let h = harness();
    let session = h.manager.spawn(spawn_request("email")).await.unwrap();
    let name = container_name(&h.runtime.calls());
    h.runtime.set_hang_on_stop(&name, true);

    assert!(h.manager.shutdown(&session.id).await);

    assert_eq!(h.runtime.kill_count(&name), 1, "kill fires exactly once at the timeout");
    assert!(h.runtime.calls().iter().any(|c| matches!(c, RuntimeCall::Remove(_))));
    assert!(h.manager.get_all().is_empty());
    assert!(h.manager.get_status(&session.id).await.is_none());
}

#[tokio::test]
async fn shutdown_tolerates_remove_failure() {
    let h = harness();
    let session = h.manager.spawn(spawn_request("email")).await.unwrap();
    let name = container_name(&h.runtime.calls());
    h.runtime.fail_remove(&name);

    assert!(h.manager.shutdown(&session.id).await);
    assert!(h.registry.by_id(&session.id).is_none());
}

#[tokio::test]
async fn second_shutdown_observes_false() {
    let h = harness();
    let session = h.manager.spawn(spawn_request("email")).await.unwrap();
    assert!(h.manager.shutdown(&session.id).await);
    assert!(!h.manager.shutdown(&session.id).await);
}

#[tokio::test]
async fn concurrent_shutdowns_have_one_winner() {
    let h = harness();
    let session = h.manager.spawn(spawn_request("email")).await.unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..4 {
        let manager = Arc::clone(&h.manager);
        let id = session.id.clone();
        tasks.spawn(async move { manager.shutdown(&id).await });
    }

    let mut winners = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn shutdown_all_clears_every_session() {
    let h = harness();
    h.manager.spawn(spawn_request("email")).await.unwrap();
    h.manager.spawn(spawn_request("slack")).await.unwrap();

    h.manager.shutdown_all().await;
    assert!(h.manager.get_all().is_empty());
    assert!(h.registry.is_empty());
}

// ── orphan cleanup ──────────────────────────────────────────────────────

#[tokio::test]
async fn orphan_cleanup_handles_running_stopped_and_missing() {
    let h = harness();
    let running = h.runtime.register("cara-email-old1", ContainerState::running());
    let stopped = h.runtime.register("cara-slack-old2", ContainerState::stopped(0));
    let missing = carapace_runtime::ContainerHandle {
        id: "gone".to_string(),
        name: "cara-gone".to_string(),
        runtime_tag: "fake".to_string(),
    };

    let report =
        h.manager.cleanup_orphans(&[running.clone(), stopped.clone(), missing]).await;

    assert_eq!(report, OrphanReport { killed: 1, removed: 1, skipped: 1 });
    assert_eq!(h.runtime.kill_count("cara-email-old1"), 1);
    assert_eq!(h.runtime.kill_count("cara-slack-old2"), 0);
    assert!(!h.runtime.exists("cara-email-old1"));
    assert!(!h.runtime.exists("cara-slack-old2"));
}

#[tokio::test]
async fn orphan_cleanup_never_touches_managed_containers() {
    let h = harness();
    let session = h.manager.spawn(spawn_request("email")).await.unwrap();
    let name = container_name(&h.runtime.calls());
    let managed_handle = carapace_runtime::ContainerHandle {
        id: "whatever".to_string(),
        name: name.clone(),
        runtime_tag: "fake".to_string(),
    };

    let report = h.manager.cleanup_orphans(&[managed_handle]).await;
    assert_eq!(report, OrphanReport::default());
    assert_eq!(h.runtime.kill_count(&name), 0);
    assert!(h.registry.by_id(&session.id).is_some());
}

// ── status ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_status_reflects_runtime_state_until_shutdown() {
    let h = harness();
    let session = h.manager.spawn(spawn_request("email")).await.unwrap();

    let state = h.manager.get_status(&session.id).await.unwrap();
    assert!(state.status.is_running());

    h.manager.shutdown(&session.id).await;
    assert!(h.manager.get_status(&session.id).await.is_none());
}

fn container_name(calls: &[RuntimeCall]) -> String {
    calls
        .iter()
        .find_map(|c| match c {
            RuntimeCall::Run { name, .. } => Some(name.clone()),
            _ => None,
        })
        .unwrap_or_default()
}
