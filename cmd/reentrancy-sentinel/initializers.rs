use std::{io::IsTerminal, sync::Arc};

use reentrancy_detector::{
    BlockAnalyzer, DetectorMetrics, EthRpcClient, PollingBlockNotifier, ReentrancyWatcher,
    SentinelFullConfig,
    config::OutputConfig,
    report::{
        JsonlFileReportHandler, LogReportHandler, ReportDispatcher, ReportHandler,
        StdoutReportHandler,
    },
};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, Layer, Registry, filter::Directive, fmt, layer::SubscriberExt};

use crate::cli::{LogColor, Options};

pub type Watcher = ReentrancyWatcher<Arc<EthRpcClient>, Arc<EthRpcClient>>;

pub fn init_tracing(opts: &Options) -> eyre::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();

    let use_color = match opts.log_color {
        LogColor::Always => true,
        LogColor::Never => false,
        LogColor::Auto => std::io::stderr().is_terminal(),
    };

    let include_target = matches!(opts.log_level, Level::DEBUG | Level::TRACE);

    // Logs go to stderr; stdout carries the report lines.
    let fmt_layer = fmt::layer()
        .with_target(include_target)
        .with_ansi(use_color)
        .with_writer(std::io::stderr);

    let subscriber = Registry::default().with(fmt_layer.with_filter(filter));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

pub fn init_report_handler(output: &OutputConfig) -> Box<dyn ReportHandler> {
    let mut dispatcher = ReportDispatcher::default();
    dispatcher.add_handler(Box::new(LogReportHandler));
    if output.stdout {
        dispatcher.add_handler(Box::new(StdoutReportHandler));
    }
    if let Some(path) = &output.jsonl_path {
        info!(path = %path.display(), "Writing block reports to JSONL file");
        dispatcher.add_handler(Box::new(JsonlFileReportHandler::new(path.clone())));
    }
    Box::new(dispatcher)
}

/// Build the watcher from a validated config. Blocks and traces share one
/// HTTP client.
pub fn init_watcher(config: &SentinelFullConfig, metrics: Arc<DetectorMetrics>) -> Watcher {
    let client = Arc::new(EthRpcClient::with_config(
        &config.rpc_url,
        config.to_rpc_config(),
    ));
    info!(rpc_url = %client.url(), "Using JSON-RPC endpoint");

    let analyzer = BlockAnalyzer::new(client.clone(), config.to_analysis_config())
        .with_metrics(metrics.clone());
    let notifier = PollingBlockNotifier::new(client, config.poll_interval());

    ReentrancyWatcher::new(notifier, analyzer, init_report_handler(&config.output))
        .with_metrics(metrics)
}
