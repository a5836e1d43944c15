// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::options::RunOptions;

fn sample_options() -> RunOptions {
    RunOptions::new("agent:latest")
        .name("cara-email-ab12")
        .env("CARAPACE_IDENTITY", "deadbeef")
        .volume("/srv/skills", "/skills", true)
        .socket("/run/cara.sock", "/run/cara.sock")
}

#[test]
fn docker_flags_for_locked_down_container() {
    let args = translate_run_flags(&sample_options(), EngineFlavor::Docker);
    let joined = args.join(" ");
    assert!(joined.contains("--name cara-email-ab12"));
    assert!(joined.contains("--read-only"));
    assert!(joined.contains("--network none"));
    assert!(joined.contains("-v /srv/skills:/skills:ro"));
    assert!(joined.contains("-v /run/cara.sock:/run/cara.sock"));
    assert!(joined.contains("-e CARAPACE_IDENTITY=deadbeef"));
}

#[test]
fn podman_adds_selinux_label_and_keep_id() {
    let args = translate_run_flags(&sample_options(), EngineFlavor::Podman);
    let joined = args.join(" ");
    assert!(joined.contains("-v /srv/skills:/skills:ro,Z"));
    assert!(joined.contains("--userns=keep-id"));
}

#[test]
fn named_network_wins_over_disabled() {
    let opts = sample_options().network("carapace-api");
    let args = translate_run_flags(&opts, EngineFlavor::Docker);
    let joined = args.join(" ");
    assert!(joined.contains("--network carapace-api"));
    assert!(!joined.contains("--network none"));
}

#[test]
fn explicit_user_suppresses_keep_id() {
    let mut opts = sample_options();
    opts.user = Some("1000:1000".to_string());
    let args = translate_run_flags(&opts, EngineFlavor::Podman);
    let joined = args.join(" ");
    assert!(joined.contains("--user 1000:1000"));
    assert!(!joined.contains("--userns=keep-id"));
}

#[test]
fn entrypoint_splits_across_flag_and_tail() {
    let mut opts = sample_options();
    opts.entrypoint = Some(vec!["/bin/agent".to_string(), "--once".to_string(), "-v".to_string()]);
    let args = translate_run_flags(&opts, EngineFlavor::Docker);
    let joined = args.join(" ");
    assert!(joined.contains("--entrypoint /bin/agent"));
    assert_eq!(entrypoint_tail(&opts), vec!["--once".to_string(), "-v".to_string()]);
}

#[test]
fn port_mappings_are_published() {
    let opts = sample_options().port(9100, 8080);
    let args = translate_run_flags(&opts, EngineFlavor::Docker);
    assert!(args.join(" ").contains("-p 9100:8080"));
}

#[test]
fn not_found_detection_covers_both_engines() {
    assert!(is_not_found("Error: No such container: cara-x"));
    assert!(is_not_found("Error: no container with name or id cara-x found"));
    assert!(!is_not_found("Error response from daemon: conflict"));
}
