//! Clap derive structures for the `tempest` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tempest -- stream live data from a WeatherFlow Tempest station
#[derive(Debug, Parser)]
#[command(
    name = "tempest",
    version,
    about = "Stream and query WeatherFlow Tempest weather station data",
    long_about = "Streams observations from a WeatherFlow Tempest station over the\n\
        push channel, falling back to REST snapshots when the stream goes quiet.",
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
    /// Station id (overrides config file)
    #[arg(long, short = 's', env = "TEMPEST_STATION", global = true)]
    pub station: Option<String>,

    /// Personal access token
    #[arg(long, env = "TEMPEST_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Path to the config file
    #[arg(long, env = "TEMPEST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// REST base URL (overrides config file)
    #[arg(long, global = true)]
    pub rest_url: Option<String>,

    /// Push channel URL (overrides config file)
    #[arg(long, global = true)]
    pub push_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TEMPEST_OUTPUT",
        default_value = "text",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    Text,
    /// Pretty-printed JSON
    Json,
    /// One JSON document per line
    JsonCompact,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream observations and connection events until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Fetch the latest observation once over REST
    #[command(alias = "snap")]
    Snapshot,

    /// Look up the station's primary sensor device
    Resolve,

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Exit after this many observations
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Only print observations (hide connection events and errors)
    #[arg(long)]
    pub observations_only: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,
    /// Print the effective configuration (token redacted)
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn watch_count_parses() {
        let cli = Cli::try_parse_from(["tempest", "watch", "-n", "3", "-s", "1234"]).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(cli.global.station.as_deref(), Some("1234"));
        match cli.command {
            Command::Watch(args) => assert_eq!(args.count, Some(3)),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
