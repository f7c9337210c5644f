// ── Source arbitrator runtime ──
//
// Owns the timers and background tasks around the `Arbitration` state
// machine: one poll task drives the LAN, WEB and probe cadences from a
// single `select!` loop (so only that task ever mutates source state
// and health counters), and one backup task mirrors credentials
// periodically and retries writes that failed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use meterbridge_api::Reading;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::arbitration::{Arbitration, Outcome, Poll};
use crate::backup::{BackupGuard, RestoreOutcome};
use crate::config::ArbitratorConfig;
use crate::error::{CoreError, FetchError};
use crate::model::{ArbitratorStatus, PublishedReading, SourceState};
use crate::sink::{ReadingSink, deliver};
use crate::source::MeterSource;
use crate::store::CredentialStore;

/// Wall-clock time derived from the tokio clock, so that timestamps
/// follow `tokio::time` (including a paused test clock).
#[derive(Debug, Clone, Copy)]
struct Clock {
    origin: Instant,
    wall: DateTime<Utc>,
}

impl Clock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            wall: Utc::now(),
        }
    }

    fn now(self) -> DateTime<Utc> {
        self.wall + chrono::Duration::from_std(self.origin.elapsed()).unwrap_or_default()
    }
}

/// Runs the LAN/WEB failover loop and publishes readings.
///
/// Cheaply cloneable via `Arc<ArbitratorInner>`.
#[derive(Clone)]
pub struct SourceArbitrator {
    inner: Arc<ArbitratorInner>,
}

struct ArbitratorInner {
    config: ArbitratorConfig,
    store: Arc<CredentialStore>,
    lan: Arc<dyn MeterSource>,
    web: Arc<dyn MeterSource>,
    sinks: Vec<Arc<dyn ReadingSink>>,
    clock: Clock,
    status: watch::Sender<ArbitratorStatus>,
    readings: watch::Sender<Option<PublishedReading>>,
    cancel: CancellationToken,
    /// Child token for the current run, replaced on every start.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SourceArbitrator {
    /// Create an arbitrator. Does NOT start polling; call
    /// [`start()`](Self::start).
    pub fn new(
        config: ArbitratorConfig,
        store: Arc<CredentialStore>,
        lan: Arc<dyn MeterSource>,
        web: Arc<dyn MeterSource>,
        sinks: Vec<Arc<dyn ReadingSink>>,
    ) -> Self {
        let clock = Clock::new();
        let machine = Arbitration::new(config.lan_failure_threshold, clock.now());
        let (status, _) = watch::channel(machine.status(clock.now(), config.stale_after_chrono()));
        let (readings, _) = watch::channel(None);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(ArbitratorInner {
                config,
                store,
                lan,
                web,
                sinks,
                clock,
                status,
                readings,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Restore credentials if needed, then spawn the background tasks.
    ///
    /// The restore completes before the first poll. A restore that fails
    /// with an I/O or corruption error aborts start-up.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.inner.config.validate()?;

        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return Err(CoreError::Validation {
                message: "arbitrator is already running".into(),
            });
        }

        let store = &self.inner.store;
        if let Some(guard) = store.backup_guard() {
            match guard.restore_if_needed() {
                Ok(RestoreOutcome::Restored) => {
                    info!("credentials restored from backup");
                    store.reload()?;
                }
                Ok(RestoreOutcome::NotNeeded) => debug!("credential restore not needed"),
                Err(e) => {
                    error!(error = %e, "credential restore failed");
                    return Err(CoreError::SetupFailed {
                        message: format!("cannot restore credentials: {e}"),
                    });
                }
            }
        }
        if store.get().is_none() {
            warn!("no credentials configured, both sources will fail until configured");
        }

        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        handles.push(tokio::spawn(poll_task(self.clone(), child.clone())));

        if let Some(guard) = store.backup_guard().cloned() {
            handles.push(tokio::spawn(backup_task(self.clone(), guard, child)));
        }

        info!(
            lan_interval_secs = self.inner.config.lan_interval.as_secs(),
            web_interval_secs = self.inner.config.web_interval.as_secs(),
            threshold = self.inner.config.lan_failure_threshold,
            "source arbitrator started"
        );
        Ok(())
    }

    /// Stop polling and wait for the background tasks to finish.
    ///
    /// In-flight requests are abandoned; the backup task flushes pending
    /// credential writes and takes a final backup before it exits.
    pub async fn shutdown(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("source arbitrator stopped");
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Subscribe to status changes (active source, health, degraded flag).
    pub fn status(&self) -> watch::Receiver<ArbitratorStatus> {
        self.inner.status.subscribe()
    }

    /// Subscribe to published readings.
    pub fn readings(&self) -> watch::Receiver<Option<PublishedReading>> {
        self.inner.readings.subscribe()
    }

    pub fn current_status(&self) -> ArbitratorStatus {
        self.inner.status.borrow().clone()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn source(&self, poll: Poll) -> &Arc<dyn MeterSource> {
        match poll.source() {
            SourceState::Lan => &self.inner.lan,
            SourceState::Web => &self.inner.web,
        }
    }

    /// One request against the source for `poll`, with fresh credentials.
    async fn fetch(&self, poll: Poll) -> Result<Reading, FetchError> {
        let Some(credentials) = self.inner.store.get() else {
            return Err(FetchError::no_credentials());
        };
        self.source(poll).fetch_reading(&credentials).await
    }

    fn apply(&self, machine: &Arbitration, outcome: Outcome) {
        if let Some(published) = outcome.published {
            debug!(
                source = %published.source,
                power_w = ?published.reading.instantaneous_power_watts,
                consumption_kwh = published.reading.consumption_total_kwh,
                "reading published"
            );
            for sink in &self.inner.sinks {
                deliver(sink.as_ref(), &published.reading, published.source);
            }
            self.inner.readings.send_replace(Some(published));
        }

        self.inner
            .status
            .send_replace(machine.status(self.inner.clock.now(), self.inner.config.stale_after_chrono()));
    }
}

// ── Background tasks ─────────────────────────────────────────────────

fn interval(period: std::time::Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Drives all three cadences. LAN polls run while LAN is active; WEB
/// polls and LAN probes run while WEB is active.
async fn poll_task(arbitrator: SourceArbitrator, cancel: CancellationToken) {
    let config = arbitrator.inner.config.clone();
    let clock = arbitrator.inner.clock;
    let mut machine = Arbitration::new(config.lan_failure_threshold, clock.now());

    let mut lan_tick = interval(config.lan_interval);
    let mut web_tick = interval(config.web_interval);
    let mut probe_tick = interval(config.lan_probe_interval);

    loop {
        let state = machine.state();
        let poll = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = lan_tick.tick(), if state == SourceState::Lan => Poll::Lan,
            _ = probe_tick.tick(), if state == SourceState::Web => Poll::Probe,
            _ = web_tick.tick(), if state == SourceState::Web => Poll::Web,
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = arbitrator.fetch(poll) => result,
        };

        let outcome = machine.record(poll, result, clock.now());
        if let Some(transition) = &outcome.transition {
            match transition.to {
                SourceState::Web => {
                    web_tick.reset_immediately();
                    probe_tick.reset();
                }
                SourceState::Lan => lan_tick.reset(),
            }
        }
        arbitrator.apply(&machine, outcome);
    }

    debug!("poll task stopped");
}

/// Periodic credential backup plus retry of failed credential writes.
/// Flushes and backs up once more on shutdown.
async fn backup_task(arbitrator: SourceArbitrator, guard: BackupGuard, cancel: CancellationToken) {
    let period = arbitrator.inner.config.backup_interval;
    let store = Arc::clone(&arbitrator.inner.store);
    let mut tick = (!period.is_zero()).then(|| interval(period));
    if let Some(tick) = tick.as_mut() {
        tick.tick().await; // consume the immediate first tick
    }

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = next_tick(tick.as_mut()) => {
                maintain(&store, &guard);
            }
        }
    }

    maintain(&store, &guard);
    debug!("backup task stopped");
}

async fn next_tick(tick: Option<&mut Interval>) {
    match tick {
        Some(tick) => {
            tick.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn maintain(store: &CredentialStore, guard: &BackupGuard) {
    match store.flush_pending() {
        Ok(true) => info!("pending credential write recovered"),
        Ok(false) => {}
        Err(e) => error!(error = %e, "credential write still failing"),
    }
    if let Err(e) = guard.backup_now() {
        error!(error = %e, "credential backup failed");
    }
}
