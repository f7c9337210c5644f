use thiserror::Error;

/// Coarse failure class used by the source arbitrator.
///
/// Every [`Error`] maps onto exactly one of these. `Network` and `Parse`
/// both count against source health; `Auth` additionally triggers a
/// one-shot token refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum FailureKind {
    #[strum(serialize = "network")]
    Network,
    #[strum(serialize = "auth")]
    Auth,
    #[strum(serialize = "parse")]
    Parse,
}

/// Top-level error type for the `meterbridge-api` crate.
///
/// Covers every failure mode of the LAN device and the cloud API.
/// `meterbridge-core` folds these into typed fetch results.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected or token refused (HTTP 401/403).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A request needed a token that has not been obtained yet.
    #[error("No {token} token available")]
    TokenMissing { token: &'static str },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success HTTP status other than an auth rejection.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// The payload parsed but describes an impossible reading.
    #[error("Invalid reading: {0}")]
    InvalidReading(String),
}

impl Error {
    /// Classify this error for failover purposes.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Authentication { .. } | Self::TokenMissing { .. } => FailureKind::Auth,
            Self::Deserialization { .. } | Self::InvalidReading(_) => FailureKind::Parse,
            Self::Transport(e) if e.is_decode() => FailureKind::Parse,
            Self::Transport(_)
            | Self::InvalidUrl(_)
            | Self::Timeout { .. }
            | Self::Tls(_)
            | Self::Api { .. } => FailureKind::Network,
        }
    }

    /// Returns `true` if a fresh token might resolve this error.
    pub fn is_auth_expired(&self) -> bool {
        self.failure_kind() == FailureKind::Auth
    }

    /// Map a `reqwest` send failure, preserving timeouts as [`Error::Timeout`].
    pub(crate) fn from_send(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                timeout_secs: timeout.as_secs(),
            }
        } else {
            Self::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_classify_as_auth() {
        let err = Error::Authentication {
            message: "nope".into(),
        };
        assert_eq!(err.failure_kind(), FailureKind::Auth);
        assert!(err.is_auth_expired());
        assert_eq!(
            Error::TokenMissing { token: "LAN" }.failure_kind(),
            FailureKind::Auth
        );
    }

    #[test]
    fn payload_errors_classify_as_parse() {
        let err = Error::Deserialization {
            message: "missing field".into(),
            body: "{}".into(),
        };
        assert_eq!(err.failure_kind(), FailureKind::Parse);
        assert_eq!(
            Error::InvalidReading("negative".into()).failure_kind(),
            FailureKind::Parse
        );
    }

    #[test]
    fn status_and_timeout_classify_as_network() {
        let err = Error::Api {
            status: 503,
            message: "busy".into(),
        };
        assert_eq!(err.failure_kind(), FailureKind::Network);
        assert_eq!(
            Error::Timeout { timeout_secs: 5 }.failure_kind(),
            FailureKind::Network
        );
        assert!(!err.is_auth_expired());
    }
}
