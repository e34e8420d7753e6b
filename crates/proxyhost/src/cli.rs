//! Clap derive structures for the `proxyhost` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// proxyhost -- keep proxy engine instances in sync with their configuration
#[derive(Debug, Parser)]
#[command(
    name = "proxyhost",
    version,
    about = "Run proxy engine instances and watch their event feed",
    long_about = "Keeps a set of proxy engine instances in sync with the configuration file,\n\
        restarting only what changed, and streams the engine's live connection events.",
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
    #[arg(long, env = "PROXYHOST_CONFIG_FILE", global = true)]
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

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
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
    /// Run the configured instances until interrupted
    Run(RunArgs),

    /// Stream events from a running engine's feed
    #[command(alias = "ev")]
    Events(EventsArgs),

    /// Inspect the configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RunMode {
    /// Every enabled instance runs independently
    Instances,
    /// One engine for the active profile
    Profile,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Engine variant (overrides `mode` in the config file)
    #[arg(long, short = 'm')]
    pub mode: Option<RunMode>,

    /// Do not print feed events
    #[arg(long)]
    pub no_events: bool,

    /// Shut down after this many seconds instead of waiting for Ctrl-C
    #[arg(long, value_name = "SECS")]
    pub stop_after: Option<u64>,
}

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Port of the engine's event API
    #[arg(long, short = 'p')]
    pub port: u16,

    /// Batch window in milliseconds (overrides the config file)
    #[arg(long, value_name = "MS")]
    pub batch_ms: Option<u64>,

    /// Exit after this many events
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,
    /// Print the effective configuration with keys masked
    Show,
    /// Load and validate the configuration
    Validate,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}
