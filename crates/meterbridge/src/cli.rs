//! Clap derive structures for the `meterbridge` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// meterbridge -- smart meter readings from the LAN with cloud failover
#[derive(Debug, Parser)]
#[command(
    name = "meterbridge",
    version,
    about = "Read a smart meter over the LAN, failing over to the cloud API",
    long_about = "Polls the meter box on the local network and switches to the vendor\n\
        cloud API after repeated LAN failures, switching back as soon as the\n\
        LAN answers again. Credentials are mirrored to a backup location and\n\
        restored automatically before polling starts.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "METERBRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "text", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON (one object per line for streaming commands)
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the meter until interrupted (Ctrl-C)
    Run,

    /// Store device address and account credentials
    Configure(ConfigureArgs),

    /// Show stored credentials (secrets redacted) and paths
    Show,

    /// Fetch one reading from a single source
    Fetch(FetchArgs),

    /// Copy the credentials file to the backup location now
    Backup,

    /// Restore credentials from the backup if the primary is missing
    Restore,

    /// Print the credential record (contains secrets)
    Export(ExportArgs),

    /// Replace stored credentials with a previously exported record
    Import(ImportArgs),

    /// Delete stored credentials and their backup
    Clear,
}

#[derive(Debug, Args)]
pub struct ConfigureArgs {
    /// Meter box address (host, host:port or http:// URL)
    #[arg(long)]
    pub device: Option<String>,

    /// Cloud account email
    #[arg(long)]
    pub email: Option<String>,

    /// Cloud account password (prefer METERBRIDGE_PASSWORD or the keyring)
    #[arg(long, hide = true)]
    pub password: Option<String>,

    /// Also remember the password in the system keyring
    #[arg(long)]
    pub keyring: bool,

    /// Log in to the cloud API before saving
    #[arg(long)]
    pub verify: bool,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Which source to query
    #[arg(value_enum)]
    pub source: SourceArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    /// The meter box on the local network
    Lan,
    /// The vendor cloud API
    Web,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Write to a file instead of stdout
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Record to import (`-` reads stdin)
    pub file: PathBuf,
}
