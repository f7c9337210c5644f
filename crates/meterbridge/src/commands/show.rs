//! `meterbridge show`: stored credentials with secrets redacted.

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output::{self, CredentialsView};

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let store = config::open_restored_store(&cfg)?;
    let credentials = config::require_credentials(&store)?;

    let view = CredentialsView::new(
        Some(&credentials),
        cfg.paths.credentials_file.display().to_string(),
        cfg.paths.backup_file.display().to_string(),
        cfg.paths.backup_file.exists(),
    );
    output::print_output(&output::render_credentials(global.output, &view), global.quiet);
    Ok(())
}
