//! Configuration for meterbridge.
//!
//! TOML file plus `METERBRIDGE_` environment overrides, platform paths,
//! password resolution (env var + system keyring), and translation into
//! `meterbridge_core::ArbitratorConfig` / `meterbridge_api::TransportConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use meterbridge_api::{DEFAULT_API_URL, DEFAULT_AUTH_URL, TlsMode, TransportConfig};
use meterbridge_core::{ArbitratorConfig, BackupGuard};

pub const ENV_PREFIX: &str = "METERBRIDGE_";
pub const PASSWORD_ENV: &str = "METERBRIDGE_PASSWORD";
const KEYRING_SERVICE: &str = "meterbridge";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub paths: Paths,

    #[serde(default)]
    pub polling: Polling,

    #[serde(default)]
    pub network: Network,
}

/// Where credentials live. The backup must survive a wipe of the
/// primary's directory, so the two should sit in different trees.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Paths {
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,

    #[serde(default = "default_backup_file")]
    pub backup_file: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            credentials_file: default_credentials_file(),
            backup_file: default_backup_file(),
        }
    }
}

fn default_credentials_file() -> PathBuf {
    data_dir().join("install").join("credentials.toml")
}
fn default_backup_file() -> PathBuf {
    data_dir().join("storage").join("credentials.backup.toml")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Polling {
    pub lan_interval_secs: u64,
    pub web_interval_secs: u64,
    pub lan_failure_threshold: u32,
    pub lan_probe_interval_secs: u64,
    pub stale_after_secs: u64,
    /// `0` turns the periodic backup off.
    pub backup_interval_secs: u64,
}

impl Default for Polling {
    fn default() -> Self {
        let defaults = ArbitratorConfig::default();
        Self {
            lan_interval_secs: defaults.lan_interval.as_secs(),
            web_interval_secs: defaults.web_interval.as_secs(),
            lan_failure_threshold: defaults.lan_failure_threshold,
            lan_probe_interval_secs: defaults.lan_probe_interval.as_secs(),
            stale_after_secs: defaults.stale_after.as_secs(),
            backup_interval_secs: defaults.backup_interval.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Network {
    pub lan_timeout_secs: u64,
    pub web_timeout_secs: u64,
    pub auth_url: String,
    pub api_url: String,
    /// Path to a custom CA certificate for the cloud API.
    pub ca_cert: Option<PathBuf>,
    pub accept_invalid_certs: bool,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            lan_timeout_secs: 5,
            web_timeout_secs: 15,
            auth_url: DEFAULT_AUTH_URL.into(),
            api_url: DEFAULT_API_URL.into(),
            ca_cert: None,
            accept_invalid_certs: false,
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("net", "meterbridge", "meterbridge")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Platform data directory; the default credential paths live below it.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn home_fallback(sub: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(sub);
    p.push("meterbridge");
    p
}

// ── Loading ───────────────────────────────────────────────────────

fn file_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
}

/// Load the config from `path` (missing file means defaults) with
/// `METERBRIDGE_` environment overrides, e.g.
/// `METERBRIDGE_POLLING__LAN_INTERVAL_SECS=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let config: Config = file_figment(path)
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    config.validate()?;
    Ok(config)
}

// ── Validation and translation ──────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.polling;
        for (field, value) in [
            ("polling.lan_interval_secs", p.lan_interval_secs),
            ("polling.web_interval_secs", p.web_interval_secs),
            ("polling.lan_failure_threshold", u64::from(p.lan_failure_threshold)),
            ("polling.lan_probe_interval_secs", p.lan_probe_interval_secs),
            ("polling.stale_after_secs", p.stale_after_secs),
            ("network.lan_timeout_secs", self.network.lan_timeout_secs),
            ("network.web_timeout_secs", self.network.web_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }

        self.auth_url()?;
        self.api_url()?;
        self.paths.validate()
    }

    pub fn auth_url(&self) -> Result<Url, ConfigError> {
        parse_url("network.auth_url", &self.network.auth_url)
    }

    pub fn api_url(&self) -> Result<Url, ConfigError> {
        parse_url("network.api_url", &self.network.api_url)
    }

    pub fn arbitrator_config(&self) -> ArbitratorConfig {
        let p = &self.polling;
        ArbitratorConfig {
            lan_interval: Duration::from_secs(p.lan_interval_secs),
            web_interval: Duration::from_secs(p.web_interval_secs),
            lan_failure_threshold: p.lan_failure_threshold,
            lan_probe_interval: Duration::from_secs(p.lan_probe_interval_secs),
            stale_after: Duration::from_secs(p.stale_after_secs),
            backup_interval: Duration::from_secs(p.backup_interval_secs),
        }
    }

    pub fn lan_transport(&self) -> TransportConfig {
        TransportConfig::lan(Duration::from_secs(self.network.lan_timeout_secs))
    }

    pub fn web_transport(&self) -> TransportConfig {
        let tls = if self.network.accept_invalid_certs {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca) = self.network.ca_cert {
            TlsMode::CustomCa(ca.clone())
        } else {
            TlsMode::System
        };
        TransportConfig::web(Duration::from_secs(self.network.web_timeout_secs), tls)
    }

    pub fn backup_guard(&self) -> BackupGuard {
        BackupGuard::new(&self.paths.credentials_file, &self.paths.backup_file)
    }
}

impl Paths {
    /// The backup may not sit inside the primary's directory: whatever
    /// wipes the primary would take the backup with it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.credentials_file == self.backup_file {
            return Err(ConfigError::invalid(
                "paths.backup_file",
                "must differ from paths.credentials_file",
            ));
        }
        match self.credentials_file.parent() {
            Some(install_dir)
                if !install_dir.as_os_str().is_empty()
                    && self.backup_file.starts_with(install_dir) =>
            {
                Err(ConfigError::invalid(
                    "paths.backup_file",
                    format!(
                        "must not be inside {} (the credentials directory)",
                        install_dir.display()
                    ),
                ))
            }
            _ => Ok(()),
        }
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse()
        .map_err(|e| ConfigError::invalid(field, format!("invalid URL {raw:?}: {e}")))
}

// ── Password resolution ─────────────────────────────────────────────

fn keyring_entry(email: &str) -> Result<keyring::Entry, ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{email}/password"))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Resolve the account password without prompting:
/// `METERBRIDGE_PASSWORD`, then the system keyring.
pub fn resolve_password(email: &str) -> Option<SecretString> {
    if let Some(pw) = std::env::var(PASSWORD_ENV).ok().filter(|pw| !pw.is_empty()) {
        debug!("password taken from {PASSWORD_ENV}");
        return Some(SecretString::from(pw));
    }

    let pw = keyring_entry(email).ok()?.get_password().ok()?;
    debug!("password taken from system keyring");
    Some(SecretString::from(pw))
}

/// Remember the account password in the system keyring.
pub fn store_password(email: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(email)?
        .set_password(password.expose_secret())
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}
