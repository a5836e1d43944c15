// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;
use yare::parameterized;

use super::*;
use crate::test_fixtures::echo_manifest_json;

#[test]
fn parses_valid_manifest() {
    let manifest = PluginManifest::parse(&echo_manifest_json().to_string()).unwrap();
    assert_eq!(manifest.version, "1.2.0");
    assert_eq!(manifest.provides.tools.len(), 1);
    assert_eq!(manifest.provides.tools[0].risk_level, RiskLevel::Low);
    assert_eq!(manifest.credential_keys(), vec!["api_token"]);
}

#[parameterized(
    description = { "description" },
    version = { "version" },
    app_compat = { "app_compat" },
    author = { "author" },
    provides = { "provides" },
)]
fn missing_required_field_is_rejected(field: &str) {
    let mut doc = echo_manifest_json();
    doc.as_object_mut().unwrap().remove(field);
    let err = PluginManifest::parse(&doc.to_string()).unwrap_err();
    assert!(matches!(err, PluginError::ManifestInvalid(_)), "{err}");
}

#[test]
fn tool_schema_without_additional_properties_false_is_rejected() {
    let mut doc = echo_manifest_json();
    doc["provides"]["tools"][0]["arguments_schema"]
        .as_object_mut()
        .unwrap()
        .remove("additionalProperties");
    let err = PluginManifest::parse(&doc.to_string()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("additionalProperties"), "{msg}");
}

#[test]
fn bad_risk_level_is_rejected() {
    let mut doc = echo_manifest_json();
    doc["provides"]["tools"][0]["risk_level"] = json!("catastrophic");
    assert!(PluginManifest::parse(&doc.to_string()).is_err());
}

#[test]
fn non_json_input_is_rejected() {
    let err = PluginManifest::parse("{ not json").unwrap_err();
    assert!(err.to_string().contains("not valid JSON"));
}

#[test]
fn credential_required_defaults_to_true() {
    let manifest = PluginManifest::parse(&echo_manifest_json().to_string()).unwrap();
    let install = manifest.install.unwrap();
    assert!(install.credentials[0].required);
}

#[test]
fn manifest_without_install_section_has_no_credentials() {
    let mut doc = echo_manifest_json();
    doc.as_object_mut().unwrap().remove("install");
    let manifest = PluginManifest::parse(&doc.to_string()).unwrap();
    assert!(manifest.credential_keys().is_empty());
}

#[test]
fn allowed_groups_parse_through() {
    let mut doc = echo_manifest_json();
    doc["provides"]["tools"][0]["allowed_groups"] = json!(["email"]);
    let manifest = PluginManifest::parse(&doc.to_string()).unwrap();
    assert_eq!(
        manifest.provides.tools[0].allowed_groups,
        Some(vec!["email".to_string()])
    );
}
