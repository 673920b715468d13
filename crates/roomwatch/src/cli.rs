//! Clap derive structures for the `roomwatch` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// roomwatch -- live view of a server room's cooling and security state
#[derive(Debug, Parser)]
#[command(
    name = "roomwatch",
    version,
    about = "Live cooling and security dashboard state from the command line",
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
    /// Config file (default: platform config dir)
    #[arg(long, env = "ROOMWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Dashboard backend URL (overrides config)
    #[arg(long, short = 'u', env = "ROOMWATCH_URL", global = true)]
    pub url: Option<String>,

    /// Bearer token for the backend
    #[arg(long, env = "ROOMWATCH_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Per-resource fetch timeout in seconds (overrides config)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, short = 'o', default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Pretty-printed JSON
    Json,
    /// One JSON document per line
    JsonCompact,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load one full snapshot and print it
    #[command(alias = "snap")]
    Snapshot,

    /// Follow live updates until interrupted
    Watch(WatchArgs),

    /// Inspect or create the config file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Full refresh period in seconds (overrides config; 0 disables)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Do not connect to the push stream
    #[arg(long)]
    pub no_stream: bool,

    /// Exit after this many updates
    #[arg(long, short = 'n')]
    pub max_updates: Option<usize>,
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

    /// Print the effective configuration (tokens masked)
    Show,

    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
