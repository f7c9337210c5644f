// LAN device HTTP client
//
// One read-only request against the meter box on the local network.
// No retries: every failure goes back to the caller as a typed error.

use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::LanMeterNow;
use crate::reading::Reading;
use crate::transport::TransportConfig;

const METER_PATH: &str = "/meter/now";

/// Client for the meter box's local `/meter/now` endpoint.
///
/// The device address is not part of the client: it comes with the
/// credentials on every call, so a reconfigured address takes effect on
/// the next tick without rebuilding anything.
#[derive(Debug, Clone)]
pub struct LocalClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl LocalClient {
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            timeout: transport.timeout,
        })
    }

    /// Build the reading URL for a device address.
    ///
    /// Accepts a bare host (`192.168.1.50`), `host:port`, or a full
    /// `http://` base URL.
    pub fn meter_url(device_address: &str) -> Result<Url, Error> {
        let address = device_address.trim().trim_end_matches('/');
        let base = if address.contains("://") {
            address.to_owned()
        } else {
            format!("http://{address}")
        };
        Ok(Url::parse(&format!("{base}{METER_PATH}"))?)
    }

    /// Fetch one reading from the device.
    pub async fn fetch_reading(
        &self,
        device_address: &str,
        lan_token: &SecretString,
    ) -> Result<Reading, Error> {
        let url = Self::meter_url(device_address)?;
        debug!("GET {}", url);

        let mut auth = HeaderValue::from_str(&format!(
            "N2G-LAN-USER token=\"{}\"",
            lan_token.expose_secret()
        ))
        .map_err(|e| Error::Authentication {
            message: format!("invalid LAN token header value: {e}"),
        })?;
        auth.set_sensitive(true);

        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, auth)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::from_send(e, self.timeout))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Authentication {
                message: format!("device rejected LAN token (HTTP {status})"),
            });
        }
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
        let payload: LanMeterNow =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&body)),
                body: body.clone(),
            })?;

        payload.into_reading(Utc::now())
    }
}

/// First 200 characters of a response body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
