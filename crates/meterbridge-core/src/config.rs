// ── Runtime arbitration configuration ──
//
// Timing and threshold knobs for the `SourceArbitrator`. Core never
// reads config files; `meterbridge-config` builds one of these.

use std::time::Duration;

use crate::error::CoreError;

/// Polling cadences and failover threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbitratorConfig {
    /// LAN poll cadence while LAN is active.
    pub lan_interval: Duration,
    /// Cloud poll cadence while WEB is active.
    pub web_interval: Duration,
    /// Consecutive LAN failures before switching to WEB.
    pub lan_failure_threshold: u32,
    /// LAN recovery probe cadence while WEB is active.
    pub lan_probe_interval: Duration,
    /// Silence after which the status is flagged as degraded.
    pub stale_after: Duration,
    /// Periodic credential backup cadence. Zero disables the periodic
    /// backup (write-through backup still happens on every change).
    pub backup_interval: Duration,
}

impl Default for ArbitratorConfig {
    fn default() -> Self {
        Self {
            lan_interval: Duration::from_secs(5),
            web_interval: Duration::from_secs(300),
            lan_failure_threshold: 3,
            lan_probe_interval: Duration::from_secs(30),
            stale_after: Duration::from_secs(900),
            backup_interval: Duration::from_secs(3600),
        }
    }
}

impl ArbitratorConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        let zero = [
            ("lan_interval", self.lan_interval.is_zero()),
            ("web_interval", self.web_interval.is_zero()),
            ("lan_probe_interval", self.lan_probe_interval.is_zero()),
            ("stale_after", self.stale_after.is_zero()),
            ("lan_failure_threshold", self.lan_failure_threshold == 0),
        ];
        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((name, _)) => Err(CoreError::Config {
                message: format!("{name} must be greater than zero"),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn stale_after_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.stale_after).unwrap_or_else(|_| chrono::Duration::weeks(5200))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ArbitratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lan_interval, Duration::from_secs(5));
        assert_eq!(config.web_interval, Duration::from_secs(300));
        assert_eq!(config.lan_failure_threshold, 3);
    }

    #[test]
    fn zero_values_are_rejected() {
        let config = ArbitratorConfig {
            lan_failure_threshold: 0,
            ..ArbitratorConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lan_failure_threshold"));

        let config = ArbitratorConfig {
            lan_probe_interval: Duration::ZERO,
            ..ArbitratorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ArbitratorConfig {
            backup_interval: Duration::ZERO,
            ..ArbitratorConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
