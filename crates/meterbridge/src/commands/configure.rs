//! `meterbridge configure`: validate and store credentials.

use dialoguer::Input;
use secrecy::SecretString;
use tracing::info;

use meterbridge_core::Credentials;

use crate::cli::{ConfigureArgs, GlobalOpts};
use crate::commands::util::prompt_err;
use crate::config;
use crate::error::CliError;

pub async fn handle(args: ConfigureArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let store = config::open_store(&cfg)?;
    let existing = store.get();

    let device = match args.device {
        Some(device) => device,
        None => prompt_text("Meter box address", existing.as_ref().map(|c| c.device_address.clone()))?,
    };
    let email = match args.email {
        Some(email) => email,
        None => prompt_text("Account email", existing.as_ref().map(|c| c.email.clone()))?,
    };
    let password = resolve_password(args.password, &email)?;

    let credentials = Credentials::new(device, email, password)?;

    if args.verify {
        let web = config::web_client(&cfg)?;
        web.login(&credentials.email, &credentials.password).await?;
        eprintln!("   ✓ Cloud login succeeded");
    }

    if args.keyring {
        meterbridge_config::store_password(&credentials.email, &credentials.password).map_err(
            |e| CliError::Validation {
                field: "keyring".into(),
                reason: e.to_string(),
            },
        )?;
        eprintln!("   ✓ Password stored in system keyring");
    }

    store.set(credentials)?;
    info!(path = %store.path().display(), "credentials configured");

    if !global.quiet {
        eprintln!("✓ Credentials saved to {}", store.path().display());
        if let Some(guard) = store.backup_guard() {
            eprintln!("  Backup at {}", guard.backup().display());
        }
    }
    Ok(())
}

fn prompt_text(prompt: &str, default: Option<String>) -> Result<String, CliError> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default);
    }
    input.interact_text().map_err(prompt_err)
}

/// `--password` flag → `METERBRIDGE_PASSWORD` → system keyring → prompt.
fn resolve_password(flag: Option<String>, email: &str) -> Result<SecretString, CliError> {
    if let Some(password) = flag {
        return Ok(SecretString::from(password));
    }
    if let Some(password) = meterbridge_config::resolve_password(email.trim()) {
        return Ok(password);
    }
    rpassword::prompt_password("Account password: ")
        .map(SecretString::from)
        .map_err(prompt_err)
}
