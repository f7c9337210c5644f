//! CLI-aware wrappers around `meterbridge-config`: `--config` handling
//! and construction of the store, sources and clients from a loaded
//! config.

use std::path::PathBuf;
use std::sync::Arc;

use meterbridge_api::{LocalClient, WebClient};
use meterbridge_config::Config;
use meterbridge_core::{
    CredentialStore, Credentials, LanSource, RestoreOutcome, TokenManager, WebSource,
};
use tracing::info;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file this invocation uses.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(meterbridge_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_file(global);
    meterbridge_config::load_config_from(&path).map_err(|e| CliError::config(&e, &path))
}

/// Open the credential store with its backup guard attached.
pub fn open_store(cfg: &Config) -> Result<Arc<CredentialStore>, CliError> {
    let store = CredentialStore::open(&cfg.paths.credentials_file)?.with_backup(cfg.backup_guard());
    Ok(Arc::new(store))
}

/// Bring back a missing or damaged primary record from the backup.
pub fn restore(cfg: &Config) -> Result<RestoreOutcome, CliError> {
    cfg.backup_guard()
        .restore_if_needed()
        .map_err(|e| CliError::SetupFailed {
            message: format!("cannot restore credentials: {e}"),
        })
}

/// [`open_store`] after restoring the primary record if it was lost.
pub fn open_restored_store(cfg: &Config) -> Result<Arc<CredentialStore>, CliError> {
    if restore(cfg)? == RestoreOutcome::Restored {
        info!(
            backup = %cfg.paths.backup_file.display(),
            "credentials restored from backup"
        );
    }
    open_store(cfg)
}

/// Stored credentials, or the "not configured" error.
pub fn require_credentials(store: &CredentialStore) -> Result<Credentials, CliError> {
    store.get().ok_or_else(|| CliError::NoCredentials {
        path: store.path().display().to_string(),
    })
}

pub fn web_client(cfg: &Config) -> Result<WebClient, CliError> {
    let invalid = |e: meterbridge_config::ConfigError| CliError::Validation {
        field: "network".into(),
        reason: e.to_string(),
    };
    let auth_url = cfg.auth_url().map_err(invalid)?;
    let api_url = cfg.api_url().map_err(invalid)?;
    Ok(WebClient::new(auth_url, api_url, &cfg.web_transport())?)
}

/// Both sources, sharing one token manager.
pub struct Sources {
    pub lan: Arc<LanSource>,
    pub web: Arc<WebSource>,
}

pub fn build_sources(cfg: &Config, store: &Arc<CredentialStore>) -> Result<Sources, CliError> {
    let tokens = Arc::new(TokenManager::new(web_client(cfg)?, Arc::clone(store)));
    let local = LocalClient::new(&cfg.lan_transport())?;
    Ok(Sources {
        lan: Arc::new(LanSource::new(local, Arc::clone(&tokens))),
        web: Arc::new(WebSource::new(tokens)),
    })
}
