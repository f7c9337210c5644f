//! Reading sinks for `meterbridge run`.
//!
//! `LogSink` emits one structured `tracing` event per entity.
//! `ConsoleSink` prints one line per reading to stdout.

use serde::Serialize;
use tracing::info;

use meterbridge_api::Reading;
use meterbridge_core::{EntityKey, ReadingSink, SourceState};

use crate::cli::OutputFormat;
use crate::output::{self, ReadingView};

pub struct LogSink;

impl ReadingSink for LogSink {
    fn update(&self, key: EntityKey, reading: &Reading, source: SourceState) {
        match key.numeric_value(reading) {
            Some(value) => info!(
                entity = %key,
                value,
                unit = key.unit().unwrap_or_default(),
                source = %source,
                "entity updated"
            ),
            None if key == EntityKey::ActiveSource => {
                info!(entity = %key, value = %source, "entity updated");
            }
            None => info!(entity = %key, source = %source, "entity unavailable"),
        }
    }
}

/// Prints readings as they are published. Text mode prints a summary
/// line per reading, JSON mode one object per entity.
pub struct ConsoleSink {
    format: OutputFormat,
    color: bool,
}

impl ConsoleSink {
    pub fn new(format: OutputFormat, color: bool) -> Self {
        Self { format, color }
    }
}

#[derive(Serialize)]
struct EntityLine<'a> {
    entity: &'a str,
    value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'static str>,
    source: SourceState,
    observed_at: chrono::DateTime<chrono::Utc>,
}

impl ReadingSink for ConsoleSink {
    fn update(&self, key: EntityKey, reading: &Reading, source: SourceState) {
        match self.format {
            OutputFormat::Text if key == EntityKey::ActiveSource => {
                let view = ReadingView::new(reading, source);
                output::print_output(&output::render_reading(self.format, &view, self.color), false);
            }
            OutputFormat::Text => {}
            OutputFormat::Json => {
                let value = match key {
                    EntityKey::ActiveSource => serde_json::Value::from(source.to_string()),
                    _ => key
                        .numeric_value(reading)
                        .map_or(serde_json::Value::Null, serde_json::Value::from),
                };
                let line = EntityLine {
                    entity: key.as_ref(),
                    value,
                    unit: key.unit(),
                    source,
                    observed_at: reading.observed_at,
                };
                output::print_output(&output::render_json(&line), false);
            }
        }
    }
}
