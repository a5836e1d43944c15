// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination. Codes are
//! stable per failure class:
//!
//! - 2: usage or validation error
//! - 3: policy rejection (reserved name, sanitizer rejection)
//! - 4: not found
//! - 5: runtime/engine failure
//! - 1: anything else

use std::fmt;

use carapace_plugins::PluginError;

#[derive(Debug)]
pub struct ExitError {
    pub code: u8,
    pub message: String,
}

impl ExitError {
    pub fn new(code: u8, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<PluginError> for ExitError {
    fn from(e: PluginError) -> Self {
        let code = match &e {
            PluginError::InvalidName(_)
            | PluginError::BlockedUrl(_)
            | PluginError::AlreadyInstalled(_)
            | PluginError::NotGitBacked(_)
            | PluginError::NoConfigSchema(_)
            | PluginError::UnknownConfigKey { .. }
            | PluginError::ConfigTypeMismatch { .. }
            | PluginError::ManifestInvalid(_) => 2,
            PluginError::ReservedName(_) | PluginError::SanitizeRejected(_) => 3,
            PluginError::NotInstalled(_) => 4,
            PluginError::Git(_) => 5,
            PluginError::Io(_) | PluginError::Json(_) => 1,
        };
        Self::new(code, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use yare::parameterized;

    use super::*;

    #[parameterized(
        invalid_name = { PluginError::InvalidName("X".into()), 2 },
        blocked_url = { PluginError::BlockedUrl("http://x".into()), 2 },
        reserved = { PluginError::ReservedName("installer".into()), 3 },
        sanitize = { PluginError::SanitizeRejected(vec!["symlink".into()]), 3 },
        missing = { PluginError::NotInstalled("ghost".into()), 4 },
    )]
    fn plugin_errors_map_to_stable_codes(error: PluginError, expected: u8) {
        assert_eq!(ExitError::from(error).code, expected);
    }
}
