// ── Domain model ──
//
// Small value types shared by the arbitrator, its sinks and its
// observers. None of them hold secrets.

use chrono::{DateTime, Utc};
use meterbridge_api::Reading;
use serde::{Deserialize, Serialize};

/// Which source is currently trusted for readings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(ascii_case_insensitive)]
pub enum SourceState {
    /// The meter box on the local network.
    #[strum(serialize = "LAN")]
    Lan,
    /// The vendor cloud API.
    #[strum(serialize = "WEB")]
    Web,
}

/// A recorded change of the active source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTransition {
    pub from: SourceState,
    pub to: SourceState,
    pub at: DateTime<Utc>,
}

/// Per-source consecutive-failure tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCounter {
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
}

impl HealthCounter {
    pub(crate) fn record_success(&mut self, at: DateTime<Utc>) {
        self.consecutive_failures = 0;
        self.last_success = Some(at);
    }

    pub(crate) fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    pub(crate) fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}

/// The fixed set of values pushed to a [`ReadingSink`](crate::ReadingSink).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
pub enum EntityKey {
    #[strum(serialize = "total_consumption")]
    TotalConsumption,
    #[strum(serialize = "total_feed_in")]
    TotalFeedIn,
    #[strum(serialize = "instantaneous_power")]
    InstantaneousPower,
    #[strum(serialize = "active_source")]
    ActiveSource,
}

impl EntityKey {
    pub const ALL: [Self; 4] = [
        Self::TotalConsumption,
        Self::TotalFeedIn,
        Self::InstantaneousPower,
        Self::ActiveSource,
    ];

    /// Numeric value this key takes from `reading`. `None` for the source
    /// label and for values the source did not report.
    pub fn numeric_value(self, reading: &Reading) -> Option<f64> {
        match self {
            Self::TotalConsumption => Some(reading.consumption_total_kwh),
            Self::TotalFeedIn => reading.feed_in_total_kwh,
            Self::InstantaneousPower => reading.instantaneous_power_watts,
            Self::ActiveSource => None,
        }
    }

    pub fn unit(self) -> Option<&'static str> {
        match self {
            Self::TotalConsumption | Self::TotalFeedIn => Some("kWh"),
            Self::InstantaneousPower => Some("W"),
            Self::ActiveSource => None,
        }
    }
}

/// A reading as it was handed to the sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedReading {
    pub reading: Reading,
    pub source: SourceState,
    pub published_at: DateTime<Utc>,
}

/// Observable snapshot of the arbitrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitratorStatus {
    pub state: SourceState,
    /// When `state` was entered.
    pub since: DateTime<Utc>,
    pub lan: HealthCounter,
    pub web: HealthCounter,
    pub last_error: Option<String>,
    pub last_published: Option<PublishedReading>,
    /// Nothing has been published for longer than the staleness window.
    pub degraded: bool,
    /// Most recent transitions, oldest first.
    pub transitions: Vec<SourceTransition>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn source_labels() {
        assert_eq!(SourceState::Lan.to_string(), "LAN");
        assert_eq!(SourceState::Web.to_string(), "WEB");
        assert_eq!(SourceState::from_str("web").unwrap(), SourceState::Web);
        assert_eq!(serde_json::to_string(&SourceState::Lan).unwrap(), "\"LAN\"");
    }

    #[test]
    fn entity_keys_pick_their_values() {
        let reading = Reading::new(Some(420.0), 1234.5, None, Utc::now()).unwrap();
        assert_eq!(EntityKey::TotalConsumption.numeric_value(&reading), Some(1234.5));
        assert_eq!(EntityKey::TotalFeedIn.numeric_value(&reading), None);
        assert_eq!(EntityKey::InstantaneousPower.numeric_value(&reading), Some(420.0));
        assert_eq!(EntityKey::ActiveSource.numeric_value(&reading), None);
        assert_eq!(EntityKey::InstantaneousPower.unit(), Some("W"));
        assert_eq!(EntityKey::ActiveSource.as_ref(), "active_source");
    }

    #[test]
    fn health_counter_saturates_and_resets() {
        let mut h = HealthCounter {
            consecutive_failures: u32::MAX,
            last_success: None,
        };
        assert_eq!(h.record_failure(), u32::MAX);
        h.record_success(Utc::now());
        assert_eq!(h.consecutive_failures, 0);
        assert!(h.last_success.is_some());
    }
}
