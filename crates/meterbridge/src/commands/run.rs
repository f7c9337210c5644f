//! `meterbridge run`: start the arbitrator and poll until Ctrl-C.

use std::sync::Arc;

use tracing::{info, warn};

use meterbridge_core::{ReadingSink, SourceArbitrator};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;
use crate::sinks::{ConsoleSink, LogSink};

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let store = config::open_store(&cfg)?;
    let sources = config::build_sources(&cfg, &store)?;

    let mut sinks: Vec<Arc<dyn ReadingSink>> = vec![Arc::new(LogSink)];
    if !global.quiet {
        let color = output::should_color(global.color);
        sinks.push(Arc::new(ConsoleSink::new(global.output, color)));
    }

    let arbitrator = SourceArbitrator::new(
        cfg.arbitrator_config(),
        store,
        sources.lan,
        sources.web,
        sinks,
    );
    arbitrator.start().await?;

    let mut status = arbitrator.status();
    let mut degraded = false;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "cannot listen for Ctrl-C, stopping");
                }
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                if snapshot.degraded != degraded {
                    degraded = snapshot.degraded;
                    if degraded {
                        warn!(
                            source = %snapshot.state,
                            last_error = snapshot.last_error.as_deref().unwrap_or("none"),
                            "no readings within the staleness window"
                        );
                    } else {
                        info!(source = %snapshot.state, "readings flowing again");
                    }
                }
            }
        }
    }

    info!("shutting down");
    arbitrator.shutdown().await;
    Ok(())
}
