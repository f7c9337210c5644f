// ── Source arbitration state machine ──
//
// Pure, clock-free decision logic: the caller feeds in the outcome of
// each poll together with the current time, and gets back what to
// publish and whether the active source changed. The async runtime in
// `arbitrator.rs` owns timers and I/O; this module owns every rule.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use meterbridge_api::Reading;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::model::{
    ArbitratorStatus, HealthCounter, PublishedReading, SourceState, SourceTransition,
};

const TRANSITION_HISTORY: usize = 32;

/// Which timer produced a poll result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Poll {
    /// Regular LAN poll while LAN is active.
    #[strum(serialize = "lan")]
    Lan,
    /// Regular WEB poll while WEB is active.
    #[strum(serialize = "web")]
    Web,
    /// LAN recovery probe while WEB is active.
    #[strum(serialize = "probe")]
    Probe,
}

impl Poll {
    /// The state in which this poll is scheduled.
    fn scheduled_in(self) -> SourceState {
        match self {
            Self::Lan => SourceState::Lan,
            Self::Web | Self::Probe => SourceState::Web,
        }
    }

    /// The source that answered this poll.
    pub fn source(self) -> SourceState {
        match self {
            Self::Lan | Self::Probe => SourceState::Lan,
            Self::Web => SourceState::Web,
        }
    }
}

/// Why a successful fetch did not reach the sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DropReason {
    /// `observed_at` not newer than the last published reading.
    #[strum(serialize = "not newer than last published reading")]
    Stale,
    /// A cumulative counter went backwards.
    #[strum(serialize = "cumulative counter decreased")]
    CounterRegression,
    /// The poll belongs to a state that is no longer active.
    #[strum(serialize = "source no longer active")]
    Inactive,
}

/// Everything one poll result caused.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub published: Option<PublishedReading>,
    pub transition: Option<SourceTransition>,
    pub dropped: Option<DropReason>,
}

/// The arbitration state machine.
#[derive(Debug, Clone)]
pub struct Arbitration {
    state: SourceState,
    since: DateTime<Utc>,
    started_at: DateTime<Utc>,
    threshold: u32,
    lan: HealthCounter,
    web: HealthCounter,
    last_error: Option<String>,
    last_published: Option<PublishedReading>,
    history: VecDeque<SourceTransition>,
}

impl Arbitration {
    /// Start in LAN with clean counters. A zero threshold behaves as one.
    pub fn new(lan_failure_threshold: u32, now: DateTime<Utc>) -> Self {
        Self {
            state: SourceState::Lan,
            since: now,
            started_at: now,
            threshold: lan_failure_threshold.max(1),
            lan: HealthCounter::default(),
            web: HealthCounter::default(),
            last_error: None,
            last_published: None,
            history: VecDeque::with_capacity(TRANSITION_HISTORY),
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn lan_health(&self) -> &HealthCounter {
        &self.lan
    }

    pub fn web_health(&self) -> &HealthCounter {
        &self.web
    }

    pub fn last_published(&self) -> Option<&PublishedReading> {
        self.last_published.as_ref()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &SourceTransition> {
        self.history.iter()
    }

    /// Feed the result of one poll into the machine.
    pub fn record(
        &mut self,
        poll: Poll,
        result: Result<Reading, FetchError>,
        now: DateTime<Utc>,
    ) -> Outcome {
        if poll.scheduled_in() != self.state {
            debug!(%poll, state = %self.state, "ignoring result from inactive schedule");
            return Outcome {
                dropped: Some(DropReason::Inactive),
                ..Outcome::default()
            };
        }

        match result {
            Ok(reading) if self.regresses(&reading) => {
                let err = FetchError::Parse {
                    message: DropReason::CounterRegression.to_string(),
                };
                Outcome {
                    dropped: Some(DropReason::CounterRegression),
                    ..self.on_failure(poll, &err, now)
                }
            }
            Ok(reading) => self.on_success(poll, reading, now),
            Err(err) => self.on_failure(poll, &err, now),
        }
    }

    /// Snapshot for observers.
    pub fn status(&self, now: DateTime<Utc>, stale_after: chrono::Duration) -> ArbitratorStatus {
        ArbitratorStatus {
            state: self.state,
            since: self.since,
            lan: self.lan.clone(),
            web: self.web.clone(),
            last_error: self.last_error.clone(),
            last_published: self.last_published.clone(),
            degraded: self.is_degraded(now, stale_after),
            transitions: self.history.iter().cloned().collect(),
        }
    }

    /// Nothing has been published for longer than `stale_after`, counting
    /// from start-up when nothing was ever published.
    pub fn is_degraded(&self, now: DateTime<Utc>, stale_after: chrono::Duration) -> bool {
        let last = self
            .last_published
            .as_ref()
            .map_or(self.started_at, |p| p.published_at);
        now - last > stale_after
    }

    // ── Transitions ──────────────────────────────────────────────────

    fn on_success(&mut self, poll: Poll, reading: Reading, now: DateTime<Utc>) -> Outcome {
        let source = poll.source();
        self.health_mut(source).record_success(now);

        let transition = (poll == Poll::Probe).then(|| self.transition(SourceState::Lan, now));

        if self.is_stale(&reading) {
            debug!(%source, observed_at = %reading.observed_at, "dropping stale reading");
            return Outcome {
                transition,
                dropped: Some(DropReason::Stale),
                ..Outcome::default()
            };
        }

        let published = PublishedReading {
            reading,
            source,
            published_at: now,
        };
        self.last_published = Some(published.clone());
        self.last_error = None;

        Outcome {
            published: Some(published),
            transition,
            dropped: None,
        }
    }

    fn on_failure(&mut self, poll: Poll, err: &FetchError, now: DateTime<Utc>) -> Outcome {
        let source = poll.source();
        let failures = self.health_mut(source).record_failure();
        self.last_error = Some(format!("{source}: {err}"));

        match err {
            FetchError::Parse { .. } => {
                warn!(%source, %poll, error = %err, "unusable reading (possible protocol change)");
            }
            _ => debug!(%source, %poll, failures, error = %err, "poll failed"),
        }

        let transition = (poll == Poll::Lan && failures >= self.threshold).then(|| {
            self.lan.reset();
            self.transition(SourceState::Web, now)
        });

        Outcome {
            transition,
            ..Outcome::default()
        }
    }

    fn transition(&mut self, to: SourceState, now: DateTime<Utc>) -> SourceTransition {
        let record = SourceTransition {
            from: self.state,
            to,
            at: now,
        };
        info!(from = %record.from, to = %record.to, "active source changed");

        self.state = to;
        self.since = now;
        if self.history.len() == TRANSITION_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(record.clone());
        record
    }

    // ── Publication checks ───────────────────────────────────────────

    fn is_stale(&self, reading: &Reading) -> bool {
        self.last_published
            .as_ref()
            .is_some_and(|last| reading.observed_at <= last.reading.observed_at)
    }

    /// A newer reading whose counters went backwards is corrupt. It is
    /// handled as a parse failure of its source.
    fn regresses(&self, reading: &Reading) -> bool {
        self.last_published.as_ref().is_some_and(|last| {
            reading.observed_at > last.reading.observed_at
                && !reading.counters_not_below(&last.reading)
        })
    }

    fn health_mut(&mut self, source: SourceState) -> &mut HealthCounter {
        match source {
            SourceState::Lan => &mut self.lan,
            SourceState::Web => &mut self.web,
        }
    }
}
