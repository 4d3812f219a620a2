use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::pipeline::{CentroidFallback, Window};

use super::parsers::{
    parse_bool_env, parse_centroid_fallback, parse_duration_arg, parse_growth,
    parse_positive_usize, parse_server_url, parse_window,
};
use super::types::PositiveUsize;

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Real-time connectivity telemetry client - live latency and packet-loss metrics with windowed stats, shape-preserving decimation, and resilient streaming."
)]
pub struct LinkpulseArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (sets log level to debug unless overridden by LINKPULSE_LOG/RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to config file (TOML/JSON). Defaults to ./linkpulse.toml or ./linkpulse.json if present.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Disable color output
    #[arg(
        long = "no-color",
        env = "NO_COLOR",
        global = true,
        value_parser = parse_bool_env,
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub no_color: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Follow the live stream and print a line per rendered snapshot
    Watch(WatchArgs),
    /// Fetch history once and print windowed metrics
    Summary(SummaryArgs),
    /// Fetch history once and write it as CSV
    Export(ExportArgs),
}

/// Where samples come from; shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct SourceArgs {
    /// Base URL of the connectivity server (e.g. http://127.0.0.1:8000)
    #[arg(long, value_parser = parse_server_url)]
    pub server: Option<Url>,

    /// Time window: 5m, 1h, 24h, or all
    #[arg(long, short = 'w', default_value = "5m", value_parser = parse_window)]
    pub window: Window,

    /// Maximum samples requested per history fetch
    #[arg(long = "history-limit", default_value = "300", value_parser = parse_positive_usize)]
    pub history_limit: PositiveUsize,

    /// Timeout for history requests (supports ms/s/m/h)
    #[arg(long = "request-timeout", default_value = "10s", value_parser = parse_duration_arg)]
    pub request_timeout: Duration,
}

#[derive(Debug, Args, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Maximum points kept in the rendered series (values below 2 are raised to 2)
    #[arg(long = "decimation-target", default_value = "500", value_parser = parse_positive_usize)]
    pub decimation_target: PositiveUsize,

    /// Reference point for decimation buckets whose look-ahead has no latency
    /// (previous-point or next-bucket-time)
    #[arg(
        long = "centroid-fallback",
        default_value = "previous-point",
        value_parser = parse_centroid_fallback
    )]
    pub centroid_fallback: CentroidFallback,

    /// Maximum samples held in memory
    #[arg(long, default_value = "100000", value_parser = parse_positive_usize)]
    pub capacity: PositiveUsize,

    /// Snapshot database path (defaults to ~/.linkpulse/snapshot.sqlite3)
    #[arg(long = "snapshot-db", conflicts_with = "no_persist")]
    pub snapshot_db: Option<PathBuf>,

    /// Do not restore or save the last snapshot
    #[arg(long = "no-persist")]
    pub no_persist: bool,

    /// Minimum time between rendered snapshots (supports ms/s/m/h)
    #[arg(long = "render-interval", default_value = "250ms", value_parser = parse_duration_arg)]
    pub render_interval: Duration,

    /// Engine output older than this is considered stale
    #[arg(long = "stale-after", default_value = "15s", value_parser = parse_duration_arg)]
    pub stale_after: Duration,

    /// How often staleness is checked
    #[arg(long = "stale-poll", default_value = "5s", value_parser = parse_duration_arg)]
    pub stale_poll: Duration,

    /// Wait this long for data before seeding from history
    #[arg(long = "seed-grace", default_value = "3s", value_parser = parse_duration_arg)]
    pub seed_grace: Duration,

    /// Re-request a snapshot this often so window trimming shows without new samples
    #[arg(long = "refresh-interval", default_value = "10s", value_parser = parse_duration_arg)]
    pub refresh_interval: Duration,

    /// First reconnect delay base
    #[arg(long = "reconnect-base", default_value = "1s", value_parser = parse_duration_arg)]
    pub reconnect_base: Duration,

    /// Reconnect delay ceiling
    #[arg(long = "reconnect-max", default_value = "30s", value_parser = parse_duration_arg)]
    pub reconnect_max: Duration,

    /// Reconnect delay growth factor per failed attempt (>= 1.0)
    #[arg(long = "reconnect-growth", default_value = "1.5", value_parser = parse_growth)]
    pub reconnect_growth: f64,
}

#[derive(Debug, Args, Clone)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output CSV path
    #[arg(long, short = 'o')]
    pub out: PathBuf,
}

impl Command {
    #[must_use]
    pub const fn source(&self) -> &SourceArgs {
        match self {
            Command::Watch(args) => &args.source,
            Command::Summary(args) => &args.source,
            Command::Export(args) => &args.source,
        }
    }

    pub const fn source_mut(&mut self) -> &mut SourceArgs {
        match self {
            Command::Watch(args) => &mut args.source,
            Command::Summary(args) => &mut args.source,
            Command::Export(args) => &mut args.source,
        }
    }
}
