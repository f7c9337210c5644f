//! `meterbridge fetch lan|web`: one reading from one source, for
//! troubleshooting. Tokens obtained on the way are persisted as usual.

use std::sync::Arc;

use tracing::debug;

use meterbridge_core::MeterSource;

use crate::cli::{FetchArgs, GlobalOpts, SourceArg};
use crate::config;
use crate::error::CliError;
use crate::output::{self, ReadingView};

pub async fn handle(args: &FetchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let store = config::open_restored_store(&cfg)?;
    let credentials = config::require_credentials(&store)?;
    let sources = config::build_sources(&cfg, &store)?;

    let source: Arc<dyn MeterSource> = match args.source {
        SourceArg::Lan => sources.lan,
        SourceArg::Web => sources.web,
    };
    debug!(source = %source.kind(), "fetching one reading");

    let reading = source.fetch_reading(&credentials).await?;
    let view = ReadingView::new(&reading, source.kind());
    let color = output::should_color(global.color);
    output::print_output(&output::render_reading(global.output, &view, color), global.quiet);
    Ok(())
}
