use std::sync::Arc;

use clap::Parser;
use eyre::WrapErr;
use reentrancy_detector::{
    DetectorMetrics,
    config::{load_config, merge_cli_overrides},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    cli::{CLI, Options},
    initializers::{init_tracing, init_watcher},
};

mod cli;
mod initializers;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let CLI { opts } = CLI::parse();

    init_tracing(&opts)?;

    if let Err(err) = run(opts).await {
        error!("{err:#}");
        return Err(err);
    }
    Ok(())
}

async fn run(opts: Options) -> eyre::Result<()> {
    let loaded = load_config(opts.config.as_ref()).wrap_err("loading sentinel config")?;
    let config = merge_cli_overrides(
        &loaded,
        opts.rpc_url.as_deref(),
        opts.poll_interval_ms,
        opts.max_concurrent_requests,
        opts.request_timeout_ms,
        opts.alert_file.as_ref(),
    );
    config.validate()?;

    let metrics = Arc::new(DetectorMetrics::new());
    let mut watcher = init_watcher(&config, metrics.clone());

    if let Some(number) = opts.block {
        watcher.analyze_block_number(number).await?;
    } else if opts.once {
        watcher.analyze_latest().await?;
    } else {
        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
            shutdown.cancel();
        });
        watcher.run(cancel).await;
    }

    let snapshot = metrics.snapshot();
    info!(
        blocks_analyzed = snapshot.blocks_analyzed,
        txs_selected = snapshot.txs_selected,
        txs_flagged_light = snapshot.txs_flagged_light,
        txs_flagged_hard = snapshot.txs_flagged_hard,
        txs_unanalyzed = snapshot.txs_unanalyzed,
        block_retrieval_failures = snapshot.block_retrieval_failures,
        "Sentinel finished"
    );
    Ok(())
}
