// ── Meter sources ──
//
// `MeterSource` is the seam between the arbitrator and the HTTP
// clients. Each call gets its own copy of the credentials and returns a
// typed result; no source retries beyond the single token refresh it
// is allowed per call.
//
// Tokens obtained during a call are written back through the
// `CredentialStore` before the reading is returned. If that write
// fails the store keeps the token in memory and the reading is still
// returned.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use meterbridge_api::{LocalClient, Reading, TokenKind, WebClient};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::credentials::Credentials;
use crate::error::FetchError;
use crate::model::SourceState;
use crate::store::CredentialStore;

/// One place readings can come from.
#[async_trait]
pub trait MeterSource: Send + Sync {
    fn kind(&self) -> SourceState;

    async fn fetch_reading(&self, credentials: &Credentials) -> Result<Reading, FetchError>;
}

// ── Token management ────────────────────────────────────────────────

/// Obtains cloud tokens and persists them through the store.
///
/// Shared by both sources: the LAN device token is issued by the cloud
/// API, so the LAN side needs a bearer token too.
pub struct TokenManager {
    web: WebClient,
    store: Arc<CredentialStore>,
}

impl TokenManager {
    pub fn new(web: WebClient, store: Arc<CredentialStore>) -> Self {
        Self { web, store }
    }

    pub fn client(&self) -> &WebClient {
        &self.web
    }

    /// Log in again and persist the new bearer token.
    pub async fn refresh_bearer(&self, credentials: &Credentials) -> Result<Credentials, FetchError> {
        debug!(token = %TokenKind::Web, "refreshing token");
        let grant = self.web.login(&credentials.email, &credentials.password).await?;

        let mut refreshed = credentials.clone();
        refreshed.apply_grant(grant.clone());
        self.write_back(credentials, TokenKind::Web, move |c| c.apply_grant(grant))
            .await;
        info!(token = %TokenKind::Web, "token refreshed");
        Ok(refreshed)
    }

    /// Return credentials with a usable bearer token, logging in first if
    /// there is none or it has expired. The flag says whether a login
    /// happened.
    pub async fn ensure_bearer(
        &self,
        credentials: &Credentials,
    ) -> Result<(Credentials, bool), FetchError> {
        if credentials.has_fresh_bearer(Utc::now()) {
            Ok((credentials.clone(), false))
        } else {
            Ok((self.refresh_bearer(credentials).await?, true))
        }
    }

    /// Ask the cloud for a new LAN device token and persist it.
    ///
    /// A rejected bearer token gets one login and one retry.
    pub async fn provision_lan_token(
        &self,
        credentials: &Credentials,
    ) -> Result<Credentials, FetchError> {
        debug!(token = %TokenKind::Lan, "provisioning token");
        let (mut creds, logged_in) = self.ensure_bearer(credentials).await?;

        let token = match self.request_lan_token(&creds).await {
            Err(e) if e.is_auth_expired() && !logged_in => {
                creds = self.refresh_bearer(&creds).await?;
                self.request_lan_token(&creds).await?
            }
            other => other?,
        };

        creds.lan_token = Some(token.clone());
        self.write_back(credentials, TokenKind::Lan, move |c| c.lan_token = Some(token))
            .await;
        info!(token = %TokenKind::Lan, "token provisioned");
        Ok(creds)
    }

    async fn request_lan_token(
        &self,
        creds: &Credentials,
    ) -> Result<SecretString, meterbridge_api::Error> {
        let bearer = creds
            .bearer_token
            .as_ref()
            .ok_or(meterbridge_api::Error::TokenMissing { token: "web" })?;
        self.web.fetch_lan_token(bearer).await
    }

    /// Apply `f` to the stored credentials, unless they were reconfigured
    /// for a different account meanwhile. The disk write runs on the
    /// blocking pool.
    async fn write_back<F>(&self, snapshot: &Credentials, kind: TokenKind, f: F)
    where
        F: FnOnce(&mut Credentials) + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let email = snapshot.email.clone();
        let result = tokio::task::spawn_blocking(move || {
            store.update(|stored| {
                if stored.email == email {
                    f(stored);
                }
            })
        })
        .await;
        match result {
            Ok(Ok(Some(_))) => {}
            Ok(Ok(None)) => debug!(token = %kind, "credentials cleared meanwhile, token not stored"),
            Ok(Err(e)) => warn!(token = %kind, error = %e, "token not persisted, kept in memory"),
            Err(e) => warn!(token = %kind, error = %e, "token write-back task failed"),
        }
    }
}

// ── LAN ─────────────────────────────────────────────────────────────

/// Readings from the meter box on the local network.
pub struct LanSource {
    client: LocalClient,
    tokens: Arc<TokenManager>,
}

impl LanSource {
    pub fn new(client: LocalClient, tokens: Arc<TokenManager>) -> Self {
        Self { client, tokens }
    }
}

#[async_trait]
impl MeterSource for LanSource {
    fn kind(&self) -> SourceState {
        SourceState::Lan
    }

    async fn fetch_reading(&self, credentials: &Credentials) -> Result<Reading, FetchError> {
        let (creds, provisioned) = match &credentials.lan_token {
            Some(_) => (credentials.clone(), false),
            None => (self.tokens.provision_lan_token(credentials).await?, true),
        };
        let token = creds
            .lan_token
            .as_ref()
            .ok_or(meterbridge_api::Error::TokenMissing { token: "LAN" })?;

        match self.client.fetch_reading(&creds.device_address, token).await {
            Err(e) if e.is_auth_expired() && !provisioned => {
                debug!(error = %e, "device rejected LAN token");
                let creds = self.tokens.provision_lan_token(&creds).await?;
                let token = creds
                    .lan_token
                    .as_ref()
                    .ok_or(meterbridge_api::Error::TokenMissing { token: "LAN" })?;
                Ok(self.client.fetch_reading(&creds.device_address, token).await?)
            }
            other => Ok(other?),
        }
    }
}

// ── WEB ─────────────────────────────────────────────────────────────

/// Readings from the vendor cloud API.
pub struct WebSource {
    tokens: Arc<TokenManager>,
}

impl WebSource {
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self { tokens }
    }

    /// Obtain a new bearer token and write it back through the store.
    pub async fn refresh_token(&self, credentials: &Credentials) -> Result<Credentials, FetchError> {
        self.tokens.refresh_bearer(credentials).await
    }
}

#[async_trait]
impl MeterSource for WebSource {
    fn kind(&self) -> SourceState {
        SourceState::Web
    }

    async fn fetch_reading(&self, credentials: &Credentials) -> Result<Reading, FetchError> {
        let (creds, refreshed) = self.tokens.ensure_bearer(credentials).await?;
        let bearer = creds
            .bearer_token
            .as_ref()
            .ok_or(meterbridge_api::Error::TokenMissing { token: "web" })?;

        match self.tokens.client().fetch_reading(bearer).await {
            Err(e) if e.is_auth_expired() && !refreshed => {
                debug!(error = %e, "bearer token rejected");
                let creds = self.refresh_token(&creds).await?;
                let bearer = creds
                    .bearer_token
                    .as_ref()
                    .ok_or(meterbridge_api::Error::TokenMissing { token: "web" })?;
                Ok(self.tokens.client().fetch_reading(bearer).await?)
            }
            other => Ok(other?),
        }
    }
}
