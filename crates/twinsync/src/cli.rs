//! Clap derive structures for the `twinsync` CLI.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// twinsync -- mirror the children of a root twin
#[derive(Debug, Parser)]
#[command(
    name = "twinsync",
    version,
    about = "Mirror the children of a root twin from the command line",
    long_about = "Connects to a twin notification endpoint, follows the child list of a\n\
        root twin, and keeps a local snapshot of every child's features.",
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
    /// Connector profile to use
    #[arg(long, short = 'p', env = "TWINSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "TWINSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Twin API base URL (overrides profile)
    #[arg(long, env = "TWINSYNC_API", global = true)]
    pub api: Option<String>,

    /// Application name (overrides profile)
    #[arg(long, short = 'a', env = "TWINSYNC_APPLICATION", global = true)]
    pub application: Option<String>,

    /// Root twin id (overrides profile)
    #[arg(long, short = 'r', env = "TWINSYNC_ROOT", global = true)]
    pub root: Option<String>,

    /// Pre-issued access token (skips the profile's auth settings)
    #[arg(long, env = "TWINSYNC_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TWINSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
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

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "TWINSYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Handshake timeout in seconds (overrides profile)
    #[arg(long, env = "TWINSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one `thing feature value` line per feature
    Plain,
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

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and print every snapshot until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Connect, wait for data, print one snapshot, and exit
    #[command(alias = "snap")]
    Snapshot(SnapshotArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch / Snapshot ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Do not print snapshots without any twins
    #[arg(long)]
    pub skip_empty: bool,

    /// Report connection state changes on stderr
    #[arg(long)]
    pub states: bool,
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// How long to wait for feature data (e.g. "30s", "2m")
    #[arg(long, short = 'w', default_value = "30s", value_parser = humantime::parse_duration)]
    pub wait: Duration,

    /// Fail with a timeout instead of printing whatever arrived
    #[arg(long)]
    pub strict: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create a profile with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// Set a value on the active profile
    Set {
        /// Profile key, e.g. "application" or "reconnect_delay"
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store the profile's secret in the system keyring
    SetSecret {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
