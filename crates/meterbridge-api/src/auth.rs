use chrono::{DateTime, Duration, Utc};
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Which token a request is authenticated with.
///
/// Marker enum (no data) -- the secret material lives in the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TokenKind {
    /// Bearer token for the cloud API, obtained by login.
    #[strum(serialize = "web")]
    Web,
    /// Device token for the LAN endpoint, issued by the cloud API.
    #[strum(serialize = "LAN")]
    Lan,
}

/// Result of a successful login against the cloud auth endpoint.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: SecretString,
    /// `None` when the server did not state a lifetime.
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenGrant {
    pub(crate) fn from_lifetime(access_token: String, expires_in: Option<i64>) -> Self {
        let expires_at = expires_in
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .map(|lifetime| Utc::now() + lifetime);
        Self {
            access_token: SecretString::from(access_token),
            expires_at,
        }
    }
}

/// Build a sensitive `Authorization: Bearer …` header value.
pub(crate) fn bearer_header(token: &SecretString) -> Result<HeaderValue, Error> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret())).map_err(
        |e| Error::Authentication {
            message: format!("invalid bearer token header value: {e}"),
        },
    )?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifetime_sets_expiry_in_the_future() {
        let grant = TokenGrant::from_lifetime("abc".into(), Some(1800));
        let expires = grant.expires_at.unwrap();
        assert!(expires > Utc::now() + Duration::seconds(1700));
        assert_eq!(grant.access_token.expose_secret(), "abc");
    }

    #[test]
    fn missing_or_bogus_lifetime_means_no_expiry() {
        assert!(TokenGrant::from_lifetime("a".into(), None).expires_at.is_none());
        assert!(TokenGrant::from_lifetime("a".into(), Some(0)).expires_at.is_none());
    }

    #[test]
    fn bearer_header_is_sensitive() {
        let header = bearer_header(&SecretString::from("tok".to_string())).unwrap();
        assert!(header.is_sensitive());
        assert_eq!(header.to_str().unwrap(), "Bearer tok");
    }
}
