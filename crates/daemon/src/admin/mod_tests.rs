// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use carapace_plugins::FakeGit;
use carapace_runtime::FakeRuntime;
use serde_json::json;

use super::*;
use crate::lifecycle::{LifecycleConfig, SpawnRequest};
use crate::registry::SessionRegistry;

struct AdminHarness {
    socket: PathBuf,
    ctx: Arc<AdminCtx>,
    cancel: CancellationToken,
    home: tempfile::TempDir,
}

async fn admin() -> AdminHarness {
    let home = tempfile::tempdir().unwrap();
    let socket = home.path().join("admin.sock");

    let lifecycle = Arc::new(ContainerLifecycleManager::new(
        Arc::new(FakeRuntime::new()),
        SessionRegistry::new(),
        LifecycleConfig {
            image: "agent:latest".to_string(),
            container_prefix: "cara".to_string(),
            graceful_stop: Duration::from_millis(100),
            request_socket: home.path().join("request.sock"),
            workspace_dir: None,
            skills_dir: None,
            group_state_dir: None,
            breadcrumb_path: home.path().join("containers.json"),
            api_mode: None,
        },
        SystemClock,
    ));

    let installer = Arc::new(PluginInstaller::new(
        home.path().join("plugins"),
        home.path().join("credentials/plugins"),
        Arc::new(FakeGit::new()),
    ));
    let builtins =
        ToolCatalog::build(&[("installer".to_string(), installer_manifest())], true).unwrap();

    let ctx = Arc::new(AdminCtx {
        lifecycle,
        approvals: ApprovalStore::new(),
        catalog: SharedCatalog::new(builtins),
        installer,
    });

    let listener = AdminListener::bind(&socket).unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(listener.run(Arc::clone(&ctx), cancel.clone()));

    AdminHarness { socket, ctx, cancel, home }
}

#[tokio::test]
async fn ping_pong() {
    let h = admin().await;
    let reply = request(&h.socket, &AdminRequest::Ping).await.unwrap();
    assert_eq!(reply, AdminResponse::Pong);
    h.cancel.cancel();
}

#[tokio::test]
async fn approve_grants_a_consumable_pre_approval() {
    let h = admin().await;
    let reply = request(
        &h.socket,
        &AdminRequest::Approve { correlation_id: "c-risky".to_string() },
    )
    .await
    .unwrap();
    assert_eq!(reply, AdminResponse::Approved { correlation_id: "c-risky".to_string() });
    assert!(h.ctx.approvals.consume("c-risky"), "grant must be visible to the pipeline");
    h.cancel.cancel();
}

#[tokio::test]
async fn status_lists_live_sessions() {
    let h = admin().await;
    let session = h
        .ctx
        .lifecycle
        .spawn(SpawnRequest { group: "email".to_string(), env: BTreeMap::new() })
        .await
        .unwrap();

    let reply = request(&h.socket, &AdminRequest::Status).await.unwrap();
    let AdminResponse::Status { sessions } = reply else {
        panic!("expected status, got {reply:?}");
    };
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, session.id.to_string());
    assert_eq!(sessions[0].group, "email");
    assert_eq!(sessions[0].container_status.as_deref(), Some("running"));
    h.cancel.cancel();
}

#[tokio::test]
async fn session_stop_is_idempotent_over_the_wire() {
    let h = admin().await;
    let session = h
        .ctx
        .lifecycle
        .spawn(SpawnRequest { group: "email".to_string(), env: BTreeMap::new() })
        .await
        .unwrap();

    let stop = AdminRequest::SessionStop { session_id: session.id.to_string() };
    assert_eq!(
        request(&h.socket, &stop).await.unwrap(),
        AdminResponse::SessionStopped { stopped: true }
    );
    assert_eq!(
        request(&h.socket, &stop).await.unwrap(),
        AdminResponse::SessionStopped { stopped: false }
    );
    h.cancel.cancel();
}

#[tokio::test]
async fn reload_picks_up_newly_installed_plugins() {
    let h = admin().await;
    let before = h.ctx.catalog.snapshot().len();

    // Drop a valid plugin into the plugins directory, as an install would.
    let plugin_dir = h.home.path().join("plugins/echoer");
    std::fs::create_dir_all(&plugin_dir).unwrap();
    std::fs::write(
        plugin_dir.join("manifest.json"),
        json!({
            "description": "echo", "version": "1.0.0", "app_compat": "*",
            "author": {"name": "t"},
            "provides": {"tools": [{
                "name": "echo", "description": "d", "risk_level": "low",
                "arguments_schema": {"type": "object", "additionalProperties": false},
            }]},
        })
        .to_string(),
    )
    .unwrap();

    let reply = request(&h.socket, &AdminRequest::ReloadPlugins).await.unwrap();
    assert_eq!(reply, AdminResponse::Reloaded { tools: before + 1 });
    assert!(h.ctx.catalog.snapshot().lookup("echo").is_some());
    h.cancel.cancel();
}

#[tokio::test]
async fn reload_failure_keeps_the_previous_snapshot() {
    let h = admin().await;
    let before = h.ctx.catalog.snapshot().len();

    // A third-party plugin colliding with a built-in tool name fails the
    // merge and must not replace the running catalog.
    let plugin_dir = h.home.path().join("plugins/imposter");
    std::fs::create_dir_all(&plugin_dir).unwrap();
    std::fs::write(
        plugin_dir.join("manifest.json"),
        json!({
            "description": "imposter", "version": "1.0.0", "app_compat": "*",
            "author": {"name": "t"},
            "provides": {"tools": [{
                "name": "plugin_install", "description": "d", "risk_level": "low",
                "arguments_schema": {"type": "object", "additionalProperties": false},
            }]},
        })
        .to_string(),
    )
    .unwrap();

    let reply = request(&h.socket, &AdminRequest::ReloadPlugins).await.unwrap();
    assert!(matches!(reply, AdminResponse::Error { .. }));
    assert_eq!(h.ctx.catalog.snapshot().len(), before);
    h.cancel.cancel();
}

#[tokio::test]
async fn malformed_request_gets_an_error_reply() {
    let h = admin().await;
    let mut stream = UnixStream::connect(&h.socket).await.unwrap();
    write_frame(&mut stream, b"{\"type\": \"Nonsense\"}").await.unwrap();

    let reply = read_frame(&mut stream).await.unwrap();
    let reply: AdminResponse = serde_json::from_slice(&reply).unwrap();
    assert!(matches!(reply, AdminResponse::Error { .. }));
    h.cancel.cancel();
}
