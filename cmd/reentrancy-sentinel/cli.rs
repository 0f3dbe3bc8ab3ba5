use std::path::PathBuf;

use clap::{Parser as ClapParser, ValueEnum};
use tracing::Level;

#[allow(clippy::upper_case_acronyms)]
#[derive(ClapParser)]
#[command(
    name = "reentrancy-sentinel",
    version,
    about = "Flags reentrancy-shaped call patterns in newly mined blocks"
)]
pub struct CLI {
    #[command(flatten)]
    pub opts: Options,
}

#[derive(ClapParser, Debug, Clone)]
pub struct Options {
    #[arg(
        long = "rpc-url",
        value_name = "URL",
        help = "JSON-RPC endpoint serving eth_* and debug_traceTransaction.",
        long_help = "Overrides `sentinel.rpc_url` from the config file. Defaults to http://localhost:8545.",
        help_heading = "Node options",
        env = "SENTINEL_RPC_URL"
    )]
    pub rpc_url: Option<String>,
    #[arg(
        long = "config",
        value_name = "CONFIG_FILE",
        help = "Path to a TOML file with a [sentinel] table.",
        help_heading = "Node options",
        env = "SENTINEL_CONFIG"
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long = "poll-interval-ms",
        value_name = "MILLISECONDS",
        help = "Pause between chain head polls.",
        help_heading = "Analysis options",
        env = "SENTINEL_POLL_INTERVAL_MS"
    )]
    pub poll_interval_ms: Option<u64>,
    #[arg(
        long = "max-concurrent-requests",
        value_name = "COUNT",
        help = "Trace requests in flight per block.",
        help_heading = "Analysis options",
        env = "SENTINEL_MAX_CONCURRENT_REQUESTS"
    )]
    pub max_concurrent_requests: Option<usize>,
    #[arg(
        long = "request-timeout-ms",
        value_name = "MILLISECONDS",
        help = "Deadline for a single trace request, retries included.",
        help_heading = "Analysis options",
        env = "SENTINEL_REQUEST_TIMEOUT_MS"
    )]
    pub request_timeout_ms: Option<u64>,
    #[arg(
        long = "alert-file",
        value_name = "JSONL_PATH",
        help = "Append every block report as a JSON line to this file.",
        help_heading = "Output options",
        env = "SENTINEL_ALERT_FILE"
    )]
    pub alert_file: Option<PathBuf>,
    #[arg(
        long = "block",
        value_name = "NUMBER",
        help = "Analyze this block once and exit.",
        conflicts_with = "once",
        help_heading = "Analysis options"
    )]
    pub block: Option<u64>,
    #[arg(
        long = "once",
        help = "Analyze the current head once and exit.",
        help_heading = "Analysis options"
    )]
    pub once: bool,
    #[arg(
        long = "log.level",
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        env = "SENTINEL_LOG_LEVEL",
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error",
        help_heading = "Output options"
    )]
    pub log_level: Level,
    #[arg(
        long = "log.color",
        value_enum,
        default_value_t = LogColor::Auto,
        help = "Output logs with ANSI color codes.",
        help_heading = "Output options",
        env = "SENTINEL_LOG_COLOR"
    )]
    pub log_color: LogColor,
}

/// When log lines carry ANSI colour codes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogColor {
    /// Colour only when stderr is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}
