// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `plugin install|list|remove|update|configure|verify`.
//!
//! These drive the installer library directly against the plugin home; a
//! running supervisor picks up changes on its next catalog reload.

use std::sync::Arc;

use carapace_plugins::{PluginInstaller, SystemGit};

use crate::exit_error::ExitError;
use crate::PluginCommand;

fn installer() -> Result<PluginInstaller, ExitError> {
    let home = carapace_daemon::env::home_dir()
        .ok_or_else(|| ExitError::new(1, "could not determine carapace home directory"))?;
    Ok(PluginInstaller::new(
        home.join("plugins"),
        home.join("credentials").join("plugins"),
        Arc::new(SystemGit::new()),
    ))
}

pub async fn run(command: PluginCommand) -> Result<(), ExitError> {
    let installer = installer()?;

    match command {
        PluginCommand::Install { url, name } => {
            let outcome = installer.install(&url, name.as_deref()).await?;
            println!("installed {} {}", outcome.name, outcome.version);
            if outcome.sanitize.hooks_removed > 0 {
                println!("  removed {} git hook(s)", outcome.sanitize.hooks_removed);
            }
            for key in &outcome.sanitize.config_keys_stripped {
                println!("  stripped git config {key}");
            }
            if !outcome.credentials.is_empty() {
                println!("credentials to provision:");
                for cred in &outcome.credentials {
                    println!("  {}  {}", cred.key, cred.description);
                }
            }
        }
        PluginCommand::List { builtin } => {
            let listings = installer.list(builtin);
            if listings.is_empty() {
                println!("no plugins installed");
            }
            for listing in listings {
                match (&listing.manifest, &listing.error) {
                    (Some(manifest), _) => {
                        println!("{}  {}  {}", listing.name, manifest.version, manifest.description);
                    }
                    (None, Some(error)) => println!("{}  (broken: {error})", listing.name),
                    (None, None) => println!("{}", listing.name),
                }
            }
        }
        PluginCommand::Remove { name, credentials } => {
            let outcome = installer.remove(&name, credentials)?;
            println!("removed {name}");
            if outcome.removed_credentials {
                println!("  removed credentials");
            }
            if outcome.requires_restart {
                println!("  restart the supervisor to apply");
            }
        }
        PluginCommand::Update { name } => {
            let outcome = installer.update(&name).await?;
            println!("updated {name}: {} -> {}", outcome.old_version, outcome.new_version);
            for key in &outcome.new_credentials {
                println!("  new credential required: {key}");
            }
        }
        PluginCommand::Configure { name, key, value } => {
            let value: serde_json::Value = serde_json::from_str(&value)
                .map_err(|e| ExitError::new(2, format!("value is not valid JSON: {e}")))?;
            installer.configure(&name, &key, value)?;
            println!("configured {name}.{key}");
        }
        PluginCommand::Verify { name } => {
            let outcome = installer.verify(&name, None).await?;
            for check in &outcome.credentials {
                match &check.problem {
                    None => println!("  credential {}: ok", check.key),
                    Some(problem) => println!("  credential {}: {problem}", check.key),
                }
            }
            println!("{name}: {}", if outcome.ready { "ready" } else { "not ready" });
            if !outcome.ready {
                return Err(ExitError::new(3, format!("{name} is not ready")));
            }
        }
    }
    Ok(())
}
