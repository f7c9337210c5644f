// ── Wire models ──
//
// Raw payload shapes for the LAN device and the cloud API, plus their
// conversion into `Reading`. Unknown fields are ignored everywhere.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::error::Error;
use crate::reading::{Reading, import_power, wh_to_kwh};

/// Power values above this are negative 24-bit two's-complement numbers.
const POWER_OVERFLOW_THRESHOLD: f64 = 9_000_000.0;
const POWER_WRAP: f64 = 16_777_216.0;

// ── LAN: GET /meter/now ─────────────────────────────────────────────

/// Response body of the device's `/meter/now` endpoint.
#[derive(Debug, Deserialize)]
pub struct LanMeterNow {
    pub elec: LanElectricity,
}

#[derive(Debug, Default, Deserialize)]
pub struct LanElectricity {
    #[serde(default)]
    pub power: Option<LanChannel>,
    #[serde(default)]
    pub import: Option<LanChannel>,
    #[serde(default)]
    pub export: Option<LanChannel>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LanChannel {
    #[serde(default)]
    pub now: Option<LanSample>,
}

/// A single device value with its epoch-seconds timestamp.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct LanSample {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub time: Option<f64>,
}

impl LanChannel {
    fn sample(&self) -> Option<LanSample> {
        self.now
    }
}

impl LanMeterNow {
    /// Convert to a [`Reading`], using `now` when the device sent no timestamps.
    pub fn into_reading(self, now: DateTime<Utc>) -> Result<Reading, Error> {
        let power = self.elec.power.as_ref().and_then(LanChannel::sample);
        let import = self.elec.import.as_ref().and_then(LanChannel::sample);
        let export = self.elec.export.as_ref().and_then(LanChannel::sample);

        let consumption_wh = import
            .and_then(|s| s.value)
            .filter(|v| v.abs() >= f64::EPSILON)
            .ok_or_else(|| Error::InvalidReading("device reported no import counter".into()))?;

        let observed_at = [power, import, export]
            .into_iter()
            .flatten()
            .filter_map(|s| s.time)
            .filter_map(epoch_to_utc)
            .max()
            .unwrap_or(now);

        Reading::new(
            power.and_then(|s| s.value).and_then(decode_power),
            wh_to_kwh(consumption_wh),
            export.and_then(|s| s.value).and_then(decode_counter),
            observed_at,
        )
    }
}

/// Decode the device's raw power register.
///
/// `0` means the register has not been populated yet. Values above the
/// overflow threshold are negative (net feed-in).
pub fn decode_power(raw: f64) -> Option<f64> {
    if raw.abs() < f64::EPSILON {
        return None;
    }
    let signed = if raw > POWER_OVERFLOW_THRESHOLD {
        raw - POWER_WRAP
    } else {
        raw
    };
    Some(import_power(signed))
}

/// Decode a device energy register in Wh to kWh. `0` means not populated.
fn decode_counter(raw: f64) -> Option<f64> {
    (raw.abs() >= f64::EPSILON).then(|| wh_to_kwh(raw))
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn epoch_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    Utc.timestamp_opt(secs.trunc() as i64, 0).single()
}

// ── WEB: GET /v2/instantaneous ──────────────────────────────────────

/// Response body of the cloud `instantaneous` endpoint.
#[derive(Debug, Deserialize)]
pub struct WebInstantaneous {
    pub data: WebInstantaneousData,
}

#[derive(Debug, Deserialize)]
pub struct WebInstantaneousData {
    pub electricity: WebElectricity,
}

#[derive(Debug, Deserialize)]
pub struct WebElectricity {
    /// Net power in watts (negative while feeding in).
    #[serde(default)]
    pub power: Option<f64>,
    pub timestamp: DateTime<Utc>,
    /// Import counter in Wh.
    pub current_summation: f64,
    /// Export counter in Wh. Not every account exposes it.
    #[serde(default)]
    pub current_summation_export: Option<f64>,
}

impl WebInstantaneous {
    pub fn into_reading(self) -> Result<Reading, Error> {
        let e = self.data.electricity;
        Reading::new(
            e.power.map(import_power),
            wh_to_kwh(e.current_summation),
            e.current_summation_export.map(wh_to_kwh),
            e.timestamp,
        )
    }
}

// ── Auth payloads ───────────────────────────────────────────────────

/// Body of a successful login.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Body of `GET /v2/lan/token`.
#[derive(Debug, Deserialize)]
pub(crate) struct LanTokenResponse {
    pub data: LanTokenData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LanTokenData {
    pub user_lan_token: String,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn lan(body: serde_json::Value) -> LanMeterNow {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn decodes_lan_payload() {
        let body = lan(json!({
            "elec": {
                "power":  { "now": { "value": 420, "time": 1_700_000_005 } },
                "import": { "now": { "value": 1_234_500, "time": 1_700_000_000 } },
                "export": { "now": { "value": 10_000, "time": 1_700_000_000 } },
                "firmware": "ignored"
            }
        }));

        let reading = body.into_reading(Utc::now()).unwrap();
        assert_eq!(reading.instantaneous_power_watts, Some(420.0));
        assert!((reading.consumption_total_kwh - 1234.5).abs() < 1e-9);
        assert_eq!(reading.feed_in_total_kwh, Some(10.0));
        assert_eq!(reading.observed_at.timestamp(), 1_700_000_005);
    }

    #[test]
    fn lan_without_import_is_a_parse_failure() {
        let body = lan(json!({
            "elec": { "power": { "now": { "value": 420, "time": 1_700_000_000 } } }
        }));
        let err = body.into_reading(Utc::now()).unwrap_err();
        assert!(matches!(err, Error::InvalidReading(_)));
    }

    #[test]
    fn lan_without_timestamps_uses_now() {
        let now = Utc.timestamp_opt(1_800_000_000, 0).single().unwrap();
        let body = lan(json!({ "elec": { "import": { "now": { "value": 5000 } } } }));
        let reading = body.into_reading(now).unwrap();
        assert_eq!(reading.observed_at, now);
        assert_eq!(reading.instantaneous_power_watts, None);
        assert_eq!(reading.feed_in_total_kwh, None);
    }

    #[test]
    fn unpopulated_export_register_is_absent() {
        let body = lan(json!({
            "elec": {
                "import": { "now": { "value": 1_234_500, "time": 1_700_000_000 } },
                "export": { "now": { "value": 0, "time": 1_700_000_000 } }
            }
        }));
        let reading = body.into_reading(Utc::now()).unwrap();
        assert_eq!(reading.feed_in_total_kwh, None);
    }

    #[test]
    fn power_register_decoding() {
        assert_eq!(decode_power(0.0), None);
        assert_eq!(decode_power(1500.0), Some(1500.0));
        // 16_777_216 - 300 encodes -300 W, i.e. feeding in.
        assert_eq!(decode_power(16_776_916.0), Some(0.0));
    }

    #[test]
    fn decodes_web_payload() {
        let body: WebInstantaneous = serde_json::from_value(json!({
            "data": {
                "electricity": {
                    "power": 420.0,
                    "timestamp": "2024-06-15T10:30:00Z",
                    "current_summation": 1_234_500.0,
                    "current_summation_export": 10_000.0
                }
            }
        }))
        .unwrap();

        let reading = body.into_reading().unwrap();
        assert_eq!(reading.instantaneous_power_watts, Some(420.0));
        assert!((reading.consumption_total_kwh - 1234.5).abs() < 1e-9);
        assert_eq!(reading.feed_in_total_kwh, Some(10.0));
        assert_eq!(reading.observed_at.to_rfc3339(), "2024-06-15T10:30:00+00:00");
    }

    #[test]
    fn web_negative_summation_is_rejected() {
        let body: WebInstantaneous = serde_json::from_value(json!({
            "data": { "electricity": {
                "power": 10.0,
                "timestamp": "2024-06-15T10:30:00Z",
                "current_summation": -5.0
            } }
        }))
        .unwrap();
        assert!(body.into_reading().is_err());
    }
}
