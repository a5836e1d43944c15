// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn minimal_config_parses_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("carapace.toml");
    std::fs::write(&path, "groups = [\"email\", \"slack\"]\n").unwrap();

    let config = SupervisorConfig::load(&path).unwrap();
    assert_eq!(config.groups, vec!["email", "slack"]);
    assert_eq!(config.max_sessions_per_group, 2);
    assert_eq!(config.engine, "docker");
    assert_eq!(config.graceful_stop(), Duration::from_secs(5));
    assert!(config.api_mode.is_none());
}

#[test]
fn full_config_parses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("carapace.toml");
    std::fs::write(
        &path,
        r#"
groups = ["email"]
max_sessions_per_group = 4
engine = "podman"
image = "agents/cara:2"
container_prefix = "crab"
graceful_stop_ms = 750
confirmation_wait_ms = 100

[rate_limit]
capacity = 2.0
refill_per_sec = 0.0166

[api_mode]
network = "carapace-net"
container_port = 8088
"#,
    )
    .unwrap();

    let config = SupervisorConfig::load(&path).unwrap();
    assert_eq!(config.engine, "podman");
    assert_eq!(config.container_prefix, "crab");
    assert_eq!(config.rate_limit.capacity, 2.0);
    let api = config.api_mode.unwrap();
    assert_eq!(api.network, "carapace-net");
    assert_eq!(api.container_port, 8088);
    assert_eq!(api.base_port, 9300);
}

#[test]
fn unreadable_file_is_an_error() {
    let err = SupervisorConfig::load(std::path::Path::new("/nonexistent/cara.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read(..)));
}

#[test]
fn malformed_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("carapace.toml");
    std::fs::write(&path, "groups = not-a-list").unwrap();
    assert!(matches!(SupervisorConfig::load(&path).unwrap_err(), ConfigError::Parse(_)));
}
