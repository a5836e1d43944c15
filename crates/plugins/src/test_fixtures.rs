// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for plugin tests.

use serde_json::json;

/// A valid manifest declaring one low-risk `echo` tool and one credential.
pub(crate) fn echo_manifest_json() -> serde_json::Value {
    json!({
        "description": "Echo test plugin",
        "version": "1.2.0",
        "app_compat": ">=0.1",
        "author": {"name": "Test Author"},
        "provides": {
            "tools": [{
                "name": "echo",
                "description": "Echo back the given text",
                "risk_level": "low",
                "arguments_schema": {
                    "type": "object",
                    "required": ["text"],
                    "properties": {"text": {"type": "string"}},
                    "additionalProperties": false,
                },
            }],
        },
        "install": {
            "credentials": [
                {"key": "api_token", "description": "Service API token"},
            ],
        },
    })
}

/// Same manifest with a different version and an extra credential, for
/// update tests.
pub(crate) fn echo_manifest_v2_json() -> serde_json::Value {
    let mut doc = echo_manifest_json();
    doc["version"] = json!("2.0.0");
    doc["install"]["credentials"] = json!([
        {"key": "api_token", "description": "Service API token"},
        {"key": "webhook_secret", "description": "Webhook signing secret"},
    ]);
    doc
}
