//! Clap derive structures for the `wanwatch` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// wanwatch -- keep an eye on a UniFi gateway's WAN links
#[derive(Debug, Parser)]
#[command(
    name = "wanwatch",
    version,
    about = "Monitor UniFi gateway WAN links and speedtests",
    long_about = "Polls a UniFi console for its gateway's WAN state, works out which\n\
        WAN link is carrying traffic, and runs speedtests on demand or on a schedule.",
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
    /// Console host or URL (overrides config)
    #[arg(long, short = 'H', env = "WANWATCH_HOST", global = true)]
    pub host: Option<String>,

    /// Site name
    #[arg(long, short = 's', env = "WANWATCH_SITE", global = true)]
    pub site: Option<String>,

    /// API key (overrides env var, keyring, and config)
    #[arg(long, env = "WANWATCH_API_KEY", global = true, hide_env = true)]
    pub api_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "WANWATCH_OUTPUT",
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

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "WANWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides config)
    #[arg(long, env = "WANWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Bare values, one per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Run the monitor and print every published snapshot
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Poll once and print the gateway's WAN state
    #[command(alias = "st")]
    Status,

    /// Trigger a speedtest on the gateway
    #[command(alias = "sp")]
    Speedtest(SpeedtestArgs),

    /// Check that the configured settings reach a gateway
    Validate,

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Full poll interval in seconds (overrides config)
    #[arg(long)]
    pub full_interval: Option<u64>,

    /// Fast poll interval in seconds (overrides config)
    #[arg(long)]
    pub fast_interval: Option<u64>,

    /// Disable automatic speedtests for this session
    #[arg(long)]
    pub no_auto_speedtest: bool,

    /// Stop after this many snapshots
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Speedtest ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SpeedtestArgs {
    /// Wait for the result instead of returning after the trigger
    #[arg(long, short = 'w')]
    pub wait: bool,

    /// Give up waiting after this many seconds
    #[arg(long, default_value = "120")]
    pub wait_timeout: u64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create the config file with guided setup
    Init,

    /// Display the resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// Set a configuration value
    Set {
        /// Config key (e.g. "host", "fast_interval_secs")
        key: String,

        /// Value to set
        value: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
