// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types for sessions and transport connections.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for a supervised agent session.
///
/// Format: `ses-` + 19-character nanoid. Created once by the lifecycle
/// manager at spawn; every other component holds this key and consults the
/// registry rather than owning the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub const PREFIX: &'static str = "ses-";

    /// Generate a new random session ID.
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, nanoid::nanoid!(19)))
    }

    /// Create a SessionId from an existing string (parsing/deserialization).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Suffix without the type prefix, truncated to at most `n` characters.
    pub fn short(&self, n: usize) -> &str {
        let suffix = self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0);
        &suffix[..n.min(suffix.len())]
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for SessionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SessionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Error from parsing a hex-encoded connection identity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityParseError {
    #[error("identity must be {expected} hex characters, got {got}")]
    BadLength { expected: usize, got: usize },

    #[error("identity contains non-hex characters")]
    BadEncoding,
}

/// Opaque bytes the transport uses to address one session.
///
/// Generated from a v4 UUID at spawn time, so possession of the value is the
/// capability: an agent proves which session it is by presenting the
/// identity on its request channel handshake. Never derived from anything
/// the agent controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionIdentity([u8; 16]);

impl ConnectionIdentity {
    pub const HEX_LEN: usize = 32;

    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Lowercase hex encoding, the form injected into agent containers.
    pub fn to_hex(&self) -> String {
        use fmt::Write;
        let mut out = String::with_capacity(Self::HEX_LEN);
        for b in self.0 {
            // Writing to a String is infallible.
            let _ = write!(out, "{:02x}", b);
        }
        out
    }

    /// Parse the hex form presented on the request-channel handshake.
    pub fn from_hex(hex: &str) -> Result<Self, IdentityParseError> {
        if hex.len() != Self::HEX_LEN {
            return Err(IdentityParseError::BadLength { expected: Self::HEX_LEN, got: hex.len() });
        }
        let mut bytes = [0u8; 16];
        for (i, chunk) in hex.as_bytes().chunks_exact(2).enumerate() {
            let hi = hex_val(chunk[0]).ok_or(IdentityParseError::BadEncoding)?;
            let lo = hex_val(chunk[1]).ok_or(IdentityParseError::BadEncoding)?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }

    /// Parse from raw frame bytes (16 raw bytes or 32 hex characters).
    pub fn from_frame(frame: &[u8]) -> Result<Self, IdentityParseError> {
        if frame.len() == 16 {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(frame);
            return Ok(Self(bytes));
        }
        let hex = std::str::from_utf8(frame).map_err(|_| IdentityParseError::BadEncoding)?;
        Self::from_hex(hex)
    }
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ConnectionIdentity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ConnectionIdentity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
