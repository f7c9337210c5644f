// ── Credentials ──
//
// In-memory credential set plus its flat on-disk record. The record is
// TOML with one key per field; keys this version does not know about
// are ignored on read.

use chrono::{DateTime, Utc};
use meterbridge_api::TokenGrant;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Everything needed to reach the device and the cloud API.
///
/// Cloned into each request; sources never keep a reference.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub device_address: String,
    pub email: String,
    pub password: SecretString,
    pub bearer_token: Option<SecretString>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub lan_token: Option<SecretString>,
}

impl Credentials {
    /// Build a fresh credential set from user input. Tokens start empty.
    pub fn new(
        device_address: impl Into<String>,
        email: impl Into<String>,
        password: SecretString,
    ) -> Result<Self, StoreError> {
        let creds = Self {
            device_address: device_address.into().trim().to_owned(),
            email: email.into().trim().to_owned(),
            password,
            bearer_token: None,
            token_expiry: None,
            lan_token: None,
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Reject empty device address, email or password.
    pub fn validate(&self) -> Result<(), StoreError> {
        let missing = [
            ("device address", self.device_address.trim().is_empty()),
            ("email", self.email.trim().is_empty()),
            ("password", self.password.expose_secret().is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, empty)| empty.then_some(field))
        .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation {
                message: format!("{} must not be empty", missing.join(", ")),
            })
        }
    }

    /// A bearer token is present and not known to be expired.
    pub fn has_fresh_bearer(&self, now: DateTime<Utc>) -> bool {
        self.bearer_token.is_some() && self.token_expiry.is_none_or(|expiry| expiry > now)
    }

    /// Store a newly issued bearer token.
    pub fn apply_grant(&mut self, grant: TokenGrant) {
        self.bearer_token = Some(grant.access_token);
        self.token_expiry = grant.expires_at;
    }

    /// Serialize to the flat on-disk record.
    pub fn to_toml(&self) -> Result<String, StoreError> {
        Ok(toml::to_string(&CredentialRecord::from(self))?)
    }

    /// Parse a flat record. The error is a human-readable reason.
    pub fn from_toml(text: &str) -> Result<Self, String> {
        let record: CredentialRecord = toml::from_str(text).map_err(|e| e.message().to_owned())?;
        let creds = Self::from(record);
        creds.validate().map_err(|e| e.to_string())?;
        Ok(creds)
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        fn same(a: Option<&SecretString>, b: Option<&SecretString>) -> bool {
            a.map(ExposeSecret::expose_secret) == b.map(ExposeSecret::expose_secret)
        }

        self.device_address == other.device_address
            && self.email == other.email
            && self.password.expose_secret() == other.password.expose_secret()
            && same(self.bearer_token.as_ref(), other.bearer_token.as_ref())
            && self.token_expiry == other.token_expiry
            && same(self.lan_token.as_ref(), other.lan_token.as_ref())
    }
}

// ── On-disk record ──────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct CredentialRecord {
    device_address: String,
    email: String,
    password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bearer_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_expiry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lan_token: Option<String>,
}

impl From<&Credentials> for CredentialRecord {
    fn from(c: &Credentials) -> Self {
        Self {
            device_address: c.device_address.clone(),
            email: c.email.clone(),
            password: c.password.expose_secret().to_owned(),
            bearer_token: c.bearer_token.as_ref().map(|t| t.expose_secret().to_owned()),
            token_expiry: c.token_expiry,
            lan_token: c.lan_token.as_ref().map(|t| t.expose_secret().to_owned()),
        }
    }
}

impl From<CredentialRecord> for Credentials {
    fn from(r: CredentialRecord) -> Self {
        Self {
            device_address: r.device_address,
            email: r.email,
            password: SecretString::from(r.password),
            bearer_token: r.bearer_token.map(SecretString::from),
            token_expiry: r.token_expiry,
            lan_token: r.lan_token.map(SecretString::from),
        }
    }
}
