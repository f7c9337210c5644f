//! Output formatting: text or JSON.

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;

use meterbridge_api::Reading;
use meterbridge_core::{Credentials, SourceState};

use crate::cli::{ColorMode, OutputFormat};

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

pub fn render_json<T: Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string(data).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn source_label(source: SourceState, color: bool) -> String {
    match (source, color) {
        (SourceState::Lan, true) => source.to_string().green().to_string(),
        (SourceState::Web, true) => source.to_string().yellow().to_string(),
        (_, false) => source.to_string(),
    }
}

// ── Readings ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ReadingView {
    pub source: SourceState,
    pub instantaneous_power_w: Option<f64>,
    pub consumption_total_kwh: f64,
    pub feed_in_total_kwh: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

impl ReadingView {
    pub fn new(reading: &Reading, source: SourceState) -> Self {
        Self {
            source,
            instantaneous_power_w: reading.instantaneous_power_watts,
            consumption_total_kwh: reading.consumption_total_kwh,
            feed_in_total_kwh: reading.feed_in_total_kwh,
            observed_at: reading.observed_at,
        }
    }
}

pub fn render_reading(format: OutputFormat, view: &ReadingView, color: bool) -> String {
    match format {
        OutputFormat::Json => render_json(view),
        OutputFormat::Text => {
            let power = view
                .instantaneous_power_w
                .map_or_else(|| "-".to_owned(), |w| format!("{w:.0} W"));
            let feed_in = view
                .feed_in_total_kwh
                .map_or_else(|| "-".to_owned(), |k| format!("{k:.3} kWh"));
            format!(
                "{}  {}  power {power}  consumption {:.3} kWh  feed-in {feed_in}",
                timestamp(view.observed_at),
                source_label(view.source, color),
                view.consumption_total_kwh,
            )
        }
    }
}

// ── Credentials ──────────────────────────────────────────────────────

/// Credentials with every secret replaced by its presence.
#[derive(Debug, Serialize)]
pub struct CredentialsView {
    pub credentials_file: String,
    pub backup_file: String,
    pub backup_present: bool,
    pub device_address: Option<String>,
    pub email: Option<String>,
    pub password: Option<&'static str>,
    pub bearer_token: Option<&'static str>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub lan_token: Option<&'static str>,
}

const REDACTED: &str = "********";

impl CredentialsView {
    pub fn new(
        creds: Option<&Credentials>,
        credentials_file: String,
        backup_file: String,
        backup_present: bool,
    ) -> Self {
        Self {
            credentials_file,
            backup_file,
            backup_present,
            device_address: creds.map(|c| c.device_address.clone()),
            email: creds.map(|c| c.email.clone()),
            password: creds.map(|_| REDACTED),
            bearer_token: creds.and_then(|c| c.bearer_token.as_ref()).map(|_| REDACTED),
            token_expiry: creds.and_then(|c| c.token_expiry),
            lan_token: creds.and_then(|c| c.lan_token.as_ref()).map(|_| REDACTED),
        }
    }
}

pub fn render_credentials(format: OutputFormat, view: &CredentialsView) -> String {
    if format == OutputFormat::Json {
        return render_json(view);
    }

    let present = |v: Option<&str>| v.unwrap_or("(none)").to_owned();
    let mut lines = vec![
        format!("credentials file: {}", view.credentials_file),
        format!(
            "backup file:      {} ({})",
            view.backup_file,
            if view.backup_present { "present" } else { "missing" }
        ),
        format!("device address:   {}", present(view.device_address.as_deref())),
        format!("email:            {}", present(view.email.as_deref())),
        format!("password:         {}", present(view.password)),
        format!("bearer token:     {}", present(view.bearer_token)),
    ];
    if let Some(expiry) = view.token_expiry {
        lines.push(format!("token expiry:     {}", timestamp(expiry)));
    }
    lines.push(format!("LAN token:        {}", present(view.lan_token)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::TimeZone;
    use secrecy::SecretString;

    use super::*;

    fn creds() -> Credentials {
        let mut c = Credentials::new(
            "10.0.0.2",
            "user@example.com",
            SecretString::from("hunter2".to_string()),
        )
        .unwrap();
        c.bearer_token = Some(SecretString::from("bearer-secret".to_string()));
        c
    }

    #[test]
    fn credentials_never_render_secrets() {
        let c = creds();
        let view = CredentialsView::new(Some(&c), "a".into(), "b".into(), true);
        for format in [OutputFormat::Text, OutputFormat::Json] {
            let out = render_credentials(format, &view);
            assert!(!out.contains("hunter2"), "{out}");
            assert!(!out.contains("bearer-secret"), "{out}");
            assert!(out.contains("user@example.com"), "{out}");
        }
    }

    #[test]
    fn text_reading_line() {
        let at = Utc.timestamp_opt(1_718_447_400, 0).single().unwrap();
        let reading = Reading::new(Some(410.0), 1234.6, None, at).unwrap();
        let out = render_reading(
            OutputFormat::Text,
            &ReadingView::new(&reading, SourceState::Lan),
            false,
        );
        assert_eq!(
            out,
            "2024-06-15T10:30:00Z  LAN  power 410 W  consumption 1234.600 kWh  feed-in -"
        );
    }
}
