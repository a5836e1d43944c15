// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential redaction for outbound responses.
//!
//! Deep-walks any JSON value and replaces leaf strings that look like
//! credentials. The walk is structural only: no response ever skips it,
//! and running it twice is a no-op because the replacement marker matches
//! none of the patterns.

use serde_json::Value;

/// Replacement for a credential-shaped leaf.
pub const REDACTED: &str = "[REDACTED]";

/// Result of redacting one value.
#[derive(Debug, Clone, PartialEq)]
pub struct Redaction {
    pub value: Value,
    /// JSON-pointer paths of replaced leaves.
    pub redacted_paths: Vec<String>,
}

/// Known credential prefixes from common providers.
const PROVIDER_PREFIXES: &[&str] = &[
    "sk_live_",
    "sk_test_",
    "sk-ant-",
    "sk-proj-",
    "ghp_",
    "gho_",
    "github_pat_",
    "xoxb-",
    "xoxp-",
    "AKIA",
];

/// Minimum length before an opaque token is considered credential-shaped.
const OPAQUE_TOKEN_MIN_LEN: usize = 40;

/// Deep-walk `value`, replacing credential-shaped leaf strings.
pub fn redact_value(value: &Value) -> Redaction {
    let mut redacted_paths = Vec::new();
    let value = walk(value, &mut String::new(), &mut redacted_paths);
    Redaction { value, redacted_paths }
}

fn walk(value: &Value, path: &mut String, redacted: &mut Vec<String>) -> Value {
    match value {
        Value::String(s) if is_credential_shaped(s) => {
            redacted.push(if path.is_empty() { "/".to_string() } else { path.clone() });
            Value::String(REDACTED.to_string())
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, child) in map {
                let len = path.len();
                path.push('/');
                path.push_str(&key.replace('~', "~0").replace('/', "~1"));
                out.insert(key.clone(), walk(child, path, redacted));
                path.truncate(len);
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, child) in items.iter().enumerate() {
                let len = path.len();
                path.push('/');
                path.push_str(&i.to_string());
                out.push(walk(child, path, redacted));
                path.truncate(len);
            }
            Value::Array(out)
        }
        other => other.clone(),
    }
}

/// Whether a leaf string matches any credential-shape predicate.
pub(crate) fn is_credential_shaped(s: &str) -> bool {
    is_bearer_token(s) || has_provider_prefix(s) || is_userinfo_url(s) || is_opaque_token(s)
}

fn is_bearer_token(s: &str) -> bool {
    let Some(rest) = s.strip_prefix("Bearer ").or_else(|| s.strip_prefix("bearer ")) else {
        return false;
    };
    rest.len() >= 16 && !rest.contains(char::is_whitespace)
}

fn has_provider_prefix(s: &str) -> bool {
    PROVIDER_PREFIXES.iter().any(|prefix| {
        s.strip_prefix(prefix)
            .is_some_and(|rest| rest.len() >= 8 && !rest.contains(char::is_whitespace))
    })
}

/// URLs carrying `user:password@` userinfo.
fn is_userinfo_url(s: &str) -> bool {
    let Some(scheme_end) = s.find("://") else {
        return false;
    };
    let rest = &s[scheme_end + 3..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    match authority.rfind('@') {
        Some(at) => authority[..at].contains(':'),
        None => false,
    }
}

/// Long opaque high-entropy tokens: no whitespace, token charset, and a mix
/// of letters and digits.
fn is_opaque_token(s: &str) -> bool {
    if s.len() < OPAQUE_TOKEN_MIN_LEN {
        return false;
    }
    let token_charset = s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '_' | '-' | '.'));
    if !token_charset {
        return false;
    }
    let has_letter = s.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = s.chars().any(|c| c.is_ascii_digit());
    has_letter && has_digit
}

#[cfg(test)]
#[path = "redact_tests.rs"]
mod tests;
