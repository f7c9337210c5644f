//! Credential storage commands: backup, restore, export, import, clear.

use std::io::Read;
use std::path::Path;

use meterbridge_core::RestoreOutcome;

use crate::cli::{ExportArgs, GlobalOpts, ImportArgs};
use crate::commands::util::confirm;
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn backup(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let store = config::open_restored_store(&cfg)?;
    config::require_credentials(&store)?;

    let guard = cfg.backup_guard();
    guard.backup_now()?;
    if !global.quiet {
        eprintln!("✓ Credentials backed up to {}", guard.backup().display());
    }
    Ok(())
}

pub fn restore(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let guard = cfg.backup_guard();

    let outcome = config::restore(&cfg)?;
    let message = match outcome {
        RestoreOutcome::Restored => format!("restored from {}", guard.backup().display()),
        RestoreOutcome::NotNeeded => "not needed".to_owned(),
    };
    output::print_output(&format!("restore: {message}"), global.quiet);
    Ok(())
}

pub fn export(args: &ExportArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let store = config::open_restored_store(&cfg)?;
    config::require_credentials(&store)?;
    let record = store.export()?;

    match &args.file {
        Some(path) => {
            write_private(path, &record)?;
            if !global.quiet {
                eprintln!("✓ Credentials exported to {} (contains secrets)", path.display());
            }
        }
        None => print!("{record}"),
    }
    Ok(())
}

pub fn import(args: &ImportArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let store = config::open_store(&cfg)?;

    let text = if args.file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.file)?
    };

    let imported = store.import(&text)?;
    if !global.quiet {
        eprintln!(
            "✓ Imported credentials for {} ({})",
            imported.email, imported.device_address
        );
    }
    Ok(())
}

pub fn clear(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let store = config::open_store(&cfg)?;

    if !confirm("Delete stored credentials and their backup?", "clear", global.yes)? {
        return Ok(());
    }
    store.clear()?;
    if !global.quiet {
        eprintln!("✓ Credentials cleared");
    }
    Ok(())
}

/// Write `contents` readable by the owner only.
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    std::io::Write::write_all(&mut file, contents.as_bytes())
}
