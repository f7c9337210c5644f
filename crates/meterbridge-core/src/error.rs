// ── Core error types ──
//
// `FetchError` is what a source hands back to the arbitrator: every
// client failure is folded into one of three recoverable classes.
// `StoreError` covers credential persistence, and `CoreError` is the
// umbrella for setup paths that a user actually gets to see.

use std::path::PathBuf;

use meterbridge_api::FailureKind;
use thiserror::Error;

/// Typed result of a failed reading request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Unreachable, timed out, or answered with a non-auth error status.
    #[error("network failure: {message}")]
    Network { message: String },

    /// Bad credentials or a token that survived its one refresh.
    #[error("authentication failure: {message}")]
    Auth { message: String },

    /// The response could not be turned into a valid reading.
    #[error("parse failure: {message}")]
    Parse { message: String },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network { .. } => FailureKind::Network,
            Self::Auth { .. } => FailureKind::Auth,
            Self::Parse { .. } => FailureKind::Parse,
        }
    }

    pub(crate) fn no_credentials() -> Self {
        Self::Auth {
            message: "no credentials configured".into(),
        }
    }
}

impl From<meterbridge_api::Error> for FetchError {
    fn from(err: meterbridge_api::Error) -> Self {
        let message = err.to_string();
        match err.failure_kind() {
            FailureKind::Network => Self::Network { message },
            FailureKind::Auth => Self::Auth { message },
            FailureKind::Parse => Self::Parse { message },
        }
    }
}

/// Credential persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading, writing, renaming or removing a file failed.
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A persisted record exists but cannot be parsed.
    #[error("credential record {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("cannot serialize credentials: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid credentials: {message}")]
    Validation { message: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for the IOFailure class (disk trouble, not bad data).
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Unified error type for setup and lifecycle operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Start-up cannot proceed (credential restore failed).
    #[error("Setup failed: {message}")]
    SetupFailed { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_fold_into_fetch_classes() {
        let err: FetchError = meterbridge_api::Error::Timeout { timeout_secs: 5 }.into();
        assert!(matches!(err, FetchError::Network { .. }));

        let err: FetchError = meterbridge_api::Error::Authentication {
            message: "expired".into(),
        }
        .into();
        assert_eq!(err.kind(), FailureKind::Auth);

        let err: FetchError = meterbridge_api::Error::InvalidReading("negative".into()).into();
        assert_eq!(err.kind(), FailureKind::Parse);
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn store_error_mentions_path() {
        let err = StoreError::io(
            "/tmp/creds.toml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_io());
        assert!(err.to_string().contains("/tmp/creds.toml"));
    }
}
