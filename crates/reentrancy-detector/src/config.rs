//! TOML-compatible configuration for the reentrancy sentinel.
//!
//! Durations are expressed as integer milliseconds so the file stays readable;
//! `to_*` methods convert them into the runtime config types.
//!
//! ```toml
//! [sentinel]
//! rpc_url = "http://localhost:8545"
//!
//! [sentinel.rpc]
//! timeout_ms = 30000
//! max_retries = 3
//!
//! [sentinel.analysis]
//! max_concurrent_requests = 16
//! request_timeout_ms = 45000
//!
//! [sentinel.notifier]
//! poll_interval_ms = 1000
//!
//! [sentinel.output]
//! stdout = true
//! jsonl_path = "/var/log/reentrancy.jsonl"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analyzer::DEFAULT_MAX_DEPTH;
use crate::error::ConfigError;
use crate::notifier::DEFAULT_POLL_INTERVAL;
use crate::orchestrator::AnalysisConfig;
use crate::rpc_client::{RpcConfig, response_nesting_limit};

pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// Top-level sentinel configuration, loadable from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelFullConfig {
    /// JSON-RPC endpoint exposing `eth_*` and `debug_traceTransaction`.
    pub rpc_url: String,
    pub rpc: RpcTomlConfig,
    pub analysis: AnalysisTomlConfig,
    pub notifier: NotifierConfig,
    pub output: OutputConfig,
}

impl Default for SentinelFullConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            rpc: RpcTomlConfig::default(),
            analysis: AnalysisTomlConfig::default(),
            notifier: NotifierConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl SentinelFullConfig {
    /// RPC client settings. The response nesting limit follows
    /// `analysis.max_depth` so a trace the analyzer accepts always decodes.
    pub fn to_rpc_config(&self) -> RpcConfig {
        RpcConfig {
            timeout: Duration::from_millis(self.rpc.timeout_ms),
            connect_timeout: Duration::from_millis(self.rpc.connect_timeout_ms),
            max_retries: self.rpc.max_retries,
            base_backoff: Duration::from_millis(self.rpc.base_backoff_ms),
            max_response_nesting: response_nesting_limit(self.analysis.max_depth),
        }
    }

    pub fn to_analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            max_concurrent_requests: self.analysis.max_concurrent_requests,
            request_timeout: Duration::from_millis(self.analysis.request_timeout_ms),
            max_depth: self.analysis.max_depth,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.notifier.poll_interval_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid("rpc_url must not be empty".to_string()));
        }
        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "rpc_url must be an http(s) URL, got {}",
                self.rpc_url
            )));
        }
        let positive = [
            ("rpc.timeout_ms", self.rpc.timeout_ms),
            ("rpc.connect_timeout_ms", self.rpc.connect_timeout_ms),
            ("analysis.request_timeout_ms", self.analysis.request_timeout_ms),
            ("notifier.poll_interval_ms", self.notifier.poll_interval_ms),
            (
                "analysis.max_concurrent_requests",
                self.analysis.max_concurrent_requests as u64,
            ),
            ("analysis.max_depth", self.analysis.max_depth as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}

/// HTTP transport settings (TOML-friendly).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcTomlConfig {
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Retries for transient failures; 0 disables retrying.
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl Default for RpcTomlConfig {
    fn default() -> Self {
        let rc = RpcConfig::default();
        Self {
            timeout_ms: rc.timeout.as_millis() as u64,
            connect_timeout_ms: rc.connect_timeout.as_millis() as u64,
            max_retries: rc.max_retries,
            base_backoff_ms: rc.base_backoff.as_millis() as u64,
        }
    }
}

/// Per-block analysis settings (TOML-friendly).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisTomlConfig {
    /// Trace requests in flight per block (default: 16).
    pub max_concurrent_requests: usize,
    /// Deadline per trace request, retries included (default: 45000).
    pub request_timeout_ms: u64,
    /// Deepest call frame accepted before a trace is reported unanalyzed.
    pub max_depth: usize,
}

impl Default for AnalysisTomlConfig {
    fn default() -> Self {
        let ac = AnalysisConfig::default();
        Self {
            max_concurrent_requests: ac.max_concurrent_requests,
            request_timeout_ms: ac.request_timeout.as_millis() as u64,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub poll_interval_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

/// Report output destinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print one line per finding to stdout (default: true).
    pub stdout: bool,
    /// Path for JSONL report file (None = disabled).
    pub jsonl_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            stdout: true,
            jsonl_path: None,
        }
    }
}

/// Wrapper for the top-level TOML structure: `[sentinel]` table.
#[derive(Debug, Deserialize)]
struct TomlWrapper {
    sentinel: Option<SentinelFullConfig>,
}

/// Parse a config from TOML text. A missing `[sentinel]` table yields the
/// defaults.
pub fn parse_config(contents: &str) -> Result<SentinelFullConfig, ConfigError> {
    let wrapper: TomlWrapper = toml::from_str(contents)?;
    Ok(wrapper.sentinel.unwrap_or_default())
}

/// Load a `SentinelFullConfig` from an optional TOML file path.
///
/// If `path` is `None`, returns the default config. The result is not
/// validated; call [`SentinelFullConfig::validate`] after applying CLI
/// overrides.
pub fn load_config(path: Option<&PathBuf>) -> Result<SentinelFullConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(SentinelFullConfig::default());
    };
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&contents)
}

/// Merge CLI overrides into a loaded (or default) config.
///
/// CLI flags take precedence over TOML values.
pub fn merge_cli_overrides(
    config: &SentinelFullConfig,
    cli_rpc_url: Option<&str>,
    cli_poll_interval_ms: Option<u64>,
    cli_max_concurrent_requests: Option<usize>,
    cli_request_timeout_ms: Option<u64>,
    cli_alert_file: Option<&PathBuf>,
) -> SentinelFullConfig {
    let mut merged = config.clone();
    if let Some(url) = cli_rpc_url {
        merged.rpc_url = url.to_string();
    }
    if let Some(ms) = cli_poll_interval_ms {
        merged.notifier.poll_interval_ms = ms;
    }
    if let Some(n) = cli_max_concurrent_requests {
        merged.analysis.max_concurrent_requests = n;
    }
    if let Some(ms) = cli_request_timeout_ms {
        merged.analysis.request_timeout_ms = ms;
    }
    if let Some(path) = cli_alert_file {
        merged.output.jsonl_path = Some(path.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_runtime_defaults() {
        let config = SentinelFullConfig::default();
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert!(config.output.stdout);
        assert!(config.output.jsonl_path.is_none());

        let analysis = config.to_analysis_config();
        assert_eq!(analysis.max_concurrent_requests, 16);
        assert_eq!(analysis.request_timeout, Duration::from_secs(45));
        assert_eq!(analysis.max_depth, DEFAULT_MAX_DEPTH);

        let rpc = config.to_rpc_config();
        assert_eq!(rpc.timeout, Duration::from_secs(30));
        assert_eq!(rpc.max_retries, 3);
        assert_eq!(rpc.max_response_nesting, RpcConfig::default().max_response_nesting);
    }

    #[test]
    fn response_nesting_follows_max_depth() {
        let config = parse_config(
            r#"
            [sentinel.analysis]
            max_depth = 300
            "#,
        )
        .unwrap();
        assert_eq!(config.to_rpc_config().max_response_nesting, 604);
    }

    #[test]
    fn default_config_validates() {
        assert!(SentinelFullConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = parse_config(
            r#"
            [sentinel]
            rpc_url = "https://node.example:8545"

            [sentinel.analysis]
            max_concurrent_requests = 4

            [sentinel.output]
            jsonl_path = "/tmp/reports.jsonl"
            "#,
        )
        .unwrap();

        assert_eq!(config.rpc_url, "https://node.example:8545");
        assert_eq!(config.analysis.max_concurrent_requests, 4);
        assert_eq!(config.analysis.request_timeout_ms, 45_000);
        assert_eq!(config.notifier.poll_interval_ms, 1_000);
        assert!(config.output.stdout);
        assert_eq!(
            config.output.jsonl_path,
            Some(PathBuf::from("/tmp/reports.jsonl"))
        );
    }

    #[test]
    fn missing_sentinel_table_yields_defaults() {
        let config = parse_config("[other]\nkey = 1\n").unwrap();
        assert_eq!(config, SentinelFullConfig::default());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = parse_config("[sentinel\nrpc_url = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut config = SentinelFullConfig::default();
        config.analysis.max_concurrent_requests = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("analysis.max_concurrent_requests"));

        let mut config = SentinelFullConfig::default();
        config.notifier.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = SentinelFullConfig::default();
        config.analysis.max_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_rpc_url_is_rejected() {
        let mut config = SentinelFullConfig::default();
        config.rpc_url = "  ".to_string();
        assert!(config.validate().is_err());

        config.rpc_url = "ws://localhost:8546".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentinel.toml");
        std::fs::write(
            &path,
            "[sentinel.notifier]\npoll_interval_ms = 250\n[sentinel.rpc]\nmax_retries = 0\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.to_rpc_config().max_retries, 0);
    }

    #[test]
    fn load_config_without_path_is_default() {
        assert_eq!(load_config(None).unwrap(), SentinelFullConfig::default());
    }

    #[test]
    fn load_config_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn cli_overrides_take_precedence() {
        let base = SentinelFullConfig::default();
        let alert = PathBuf::from("/tmp/alerts.jsonl");
        let merged = merge_cli_overrides(
            &base,
            Some("http://10.0.0.1:8545"),
            Some(500),
            Some(2),
            None,
            Some(&alert),
        );

        assert_eq!(merged.rpc_url, "http://10.0.0.1:8545");
        assert_eq!(merged.notifier.poll_interval_ms, 500);
        assert_eq!(merged.analysis.max_concurrent_requests, 2);
        assert_eq!(merged.analysis.request_timeout_ms, 45_000);
        assert_eq!(merged.output.jsonl_path, Some(alert));
    }

    #[test]
    fn no_overrides_is_identity() {
        let base = SentinelFullConfig::default();
        assert_eq!(merge_cli_overrides(&base, None, None, None, None, None), base);
    }
}
