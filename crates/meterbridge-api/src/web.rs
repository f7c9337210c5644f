// Cloud API HTTP client
//
// Login (credentials → bearer token), LAN-token issuance and the
// instantaneous reading endpoint. Token refresh policy lives in the
// caller; this client performs exactly one request per method call.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::auth::{TokenGrant, bearer_header};
use crate::error::Error;
use crate::local::preview;
use crate::models::{LanTokenResponse, LoginResponse, WebInstantaneous};
use crate::reading::Reading;
use crate::transport::TransportConfig;

pub const DEFAULT_AUTH_URL: &str = "https://webapp.iona-energy.com/auth";
pub const DEFAULT_API_URL: &str = "https://api.n2g-iona.net";

const INSTANTANEOUS_PATH: &str = "v2/instantaneous";
const LAN_TOKEN_PATH: &str = "v2/lan/token";

/// Async client for the vendor cloud API.
#[derive(Debug, Clone)]
pub struct WebClient {
    http: reqwest::Client,
    auth_url: Url,
    api_url: Url,
    timeout: Duration,
}

impl WebClient {
    pub fn new(auth_url: Url, api_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            auth_url,
            api_url: normalize_base(api_url),
            timeout: transport.timeout,
        })
    }

    /// Log in with account credentials and obtain a bearer token.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<TokenGrant, Error> {
        debug!("logging in at {}", self.auth_url);

        let body = json!({
            "method": "login",
            "username": email,
            "password": password.expose_secret(),
        });

        let resp = self
            .http
            .post(self.auth_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::from_send(e, self.timeout))?;

        let status = resp.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {}", preview(&body)),
            });
        }

        let login: LoginResponse = self.parse_json(resp).await?;
        debug!("login successful");
        Ok(TokenGrant::from_lifetime(login.access_token, login.expires_in))
    }

    /// Fetch the current meter values through the cloud.
    pub async fn fetch_reading(&self, bearer: &SecretString) -> Result<Reading, Error> {
        let payload: WebInstantaneous = self.get_json(INSTANTANEOUS_PATH, bearer).await?;
        payload.into_reading()
    }

    /// Ask the cloud to issue a token for the local device endpoint.
    pub async fn fetch_lan_token(&self, bearer: &SecretString) -> Result<SecretString, Error> {
        let payload: LanTokenResponse = self.get_json(LAN_TOKEN_PATH, bearer).await?;
        Ok(SecretString::from(payload.data.user_lan_token))
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        bearer: &SecretString,
    ) -> Result<T, Error> {
        let url = self.api_url.join(path)?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, bearer_header(bearer)?)
            .send()
            .await
            .map_err(|e| Error::from_send(e, self.timeout))?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "bearer token expired or invalid".into(),
            });
        }

        self.parse_json(resp).await
    }

    async fn parse_json<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: preview(&body),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_send(e, self.timeout))?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })
    }
}

/// Ensure the API base ends with `/` so relative joins keep its path.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
