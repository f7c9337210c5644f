// ── Meter reading value type ──
//
// A `Reading` can only be built through `Reading::new`, which rejects
// negative or non-finite values. Cross-reading checks (monotonic
// counters, ordering) belong to the arbitrator, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One snapshot of the meter, immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Grid import power in watts. `None` when the source did not report it.
    pub instantaneous_power_watts: Option<f64>,
    /// Cumulative consumption (import) counter in kWh.
    pub consumption_total_kwh: f64,
    /// Cumulative feed-in (export) counter in kWh, if the source reports it.
    pub feed_in_total_kwh: Option<f64>,
    /// When the source took the measurement.
    pub observed_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(
        instantaneous_power_watts: Option<f64>,
        consumption_total_kwh: f64,
        feed_in_total_kwh: Option<f64>,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, Error> {
        check_non_negative("instantaneous power", instantaneous_power_watts)?;
        check_non_negative("consumption total", Some(consumption_total_kwh))?;
        check_non_negative("feed-in total", feed_in_total_kwh)?;

        Ok(Self {
            instantaneous_power_watts,
            consumption_total_kwh,
            feed_in_total_kwh,
            observed_at,
        })
    }

    /// Check that both counters are at least the previous reading's.
    ///
    /// A feed-in counter missing on either side is not compared.
    pub fn counters_not_below(&self, previous: &Self) -> bool {
        if self.consumption_total_kwh < previous.consumption_total_kwh {
            return false;
        }
        match (self.feed_in_total_kwh, previous.feed_in_total_kwh) {
            (Some(now), Some(before)) => now >= before,
            _ => true,
        }
    }
}

fn check_non_negative(field: &str, value: Option<f64>) -> Result<(), Error> {
    match value {
        Some(v) if !v.is_finite() => Err(Error::InvalidReading(format!("{field} is not finite"))),
        Some(v) if v < 0.0 => Err(Error::InvalidReading(format!("{field} is negative ({v})"))),
        _ => Ok(()),
    }
}

/// Convert a signed net power value into grid import power.
///
/// Negative values mean the household is feeding in; import is zero then.
pub(crate) fn import_power(net_watts: f64) -> f64 {
    net_watts.max(0.0)
}

/// Watt-hours to kilowatt-hours.
pub(crate) fn wh_to_kwh(wh: f64) -> f64 {
    wh / 1000.0
}
