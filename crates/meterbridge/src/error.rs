//! CLI error types with miette diagnostics.
//!
//! Maps core, config and fetch errors into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use meterbridge_config::ConfigError;
use meterbridge_core::{CoreError, FetchError, StoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const SETUP: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Credentials ──────────────────────────────────────────────────

    #[error("No credentials configured")]
    #[diagnostic(
        code(meterbridge::no_credentials),
        help(
            "Store them with: meterbridge configure --device <addr> --email <email>\n\
             Credentials file: {path}"
        )
    )]
    NoCredentials { path: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(meterbridge::auth_failed),
        help(
            "Check the account email and password.\n\
             Run: meterbridge configure"
        )
    )]
    AuthFailed { message: String },

    #[error("Credential storage failed: {message}")]
    #[diagnostic(code(meterbridge::store))]
    Store { message: String },

    #[error("Cannot restore credentials: {message}")]
    #[diagnostic(
        code(meterbridge::setup_failed),
        help(
            "The backup exists but could not be used.\n\
             Inspect or remove it, then run: meterbridge configure"
        )
    )]
    SetupFailed { message: String },

    // ── Sources ──────────────────────────────────────────────────────

    #[error("Could not reach the meter: {message}")]
    #[diagnostic(
        code(meterbridge::connection_failed),
        help("Check the device address and that the meter box is on the network.")
    )]
    ConnectionFailed { message: String },

    #[error("Unusable response: {message}")]
    #[diagnostic(
        code(meterbridge::parse_failed),
        help("The device or API answered with an unexpected payload; its format may have changed.")
    )]
    ParseFailed { message: String },

    // ── Validation / config ──────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(meterbridge::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(meterbridge::config),
        help("Config file: {path}")
    )]
    Config { message: String, path: String },

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(meterbridge::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO ───────────────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoCredentials { .. } | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::SetupFailed { .. } => exit_code::SETUP,
            Self::Validation { .. } | Self::Config { .. } | Self::NonInteractiveRequiresYes { .. } => {
                exit_code::USAGE
            }
            Self::Store { .. } | Self::ParseFailed { .. } | Self::Io(_) => {
                exit_code::GENERAL
            }
        }
    }

    pub fn config(err: &ConfigError, path: &std::path::Path) -> Self {
        Self::Config {
            message: err.to_string(),
            path: path.display().to_string(),
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<FetchError> for CliError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network { message } => Self::ConnectionFailed { message },
            FetchError::Auth { message } => Self::AuthFailed { message },
            FetchError::Parse { message } => Self::ParseFailed { message },
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation { message } => Self::Validation {
                field: "credentials".into(),
                reason: message,
            },
            other => Self::Store {
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SetupFailed { message } => Self::SetupFailed { message },
            CoreError::Store(e) => e.into(),
            CoreError::Config { message } => Self::Validation {
                field: "polling".into(),
                reason: message,
            },
            CoreError::Validation { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },
        }
    }
}

impl From<meterbridge_api::Error> for CliError {
    fn from(err: meterbridge_api::Error) -> Self {
        FetchError::from(err).into()
    }
}
