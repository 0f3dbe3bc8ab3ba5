//! Watch loop tying the notifier, the block analyzer, and report handlers
//! together.
//!
//! Each cycle fetches exactly the block number the notifier reported, so a
//! head that moves during the cycle never causes a different block to be
//! analyzed. Cycles run strictly one after another.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::DetectorError;
use crate::metrics::DetectorMetrics;
use crate::notifier::PollingBlockNotifier;
use crate::orchestrator::BlockAnalyzer;
use crate::report::ReportHandler;
use crate::source::{BlockSource, TraceSource};
use crate::types::BlockReport;

pub struct ReentrancyWatcher<B, T> {
    notifier: PollingBlockNotifier<B>,
    analyzer: BlockAnalyzer<T>,
    handler: Box<dyn ReportHandler>,
    metrics: Option<Arc<DetectorMetrics>>,
}

impl<B: BlockSource, T: TraceSource> ReentrancyWatcher<B, T> {
    pub fn new(
        notifier: PollingBlockNotifier<B>,
        analyzer: BlockAnalyzer<T>,
        handler: Box<dyn ReportHandler>,
    ) -> Self {
        Self {
            notifier,
            analyzer,
            handler,
            metrics: None,
        }
    }

    /// Count block retrieval failures into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<DetectorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn notifier(&self) -> &PollingBlockNotifier<B> {
        &self.notifier
    }

    /// Fetch block `number`, analyze it, and hand the report to the handler.
    ///
    /// Fails only when the block itself cannot be retrieved; per-transaction
    /// failures end up in the report.
    pub async fn analyze_block_number(&self, number: u64) -> Result<BlockReport, DetectorError> {
        let block = match self.notifier.source().block_by_number(number).await {
            Ok(block) => block,
            Err(source) => {
                if let Some(metrics) = &self.metrics {
                    metrics.increment_block_retrieval_failures();
                }
                return Err(DetectorError::BlockRetrieval {
                    block_number: number,
                    source,
                });
            }
        };

        let report = self.analyzer.analyze_block(&block).await;
        self.handler.on_report(&report);
        Ok(report)
    }

    /// Analyze whatever block is currently at the head.
    pub async fn analyze_latest(&self) -> Result<BlockReport, DetectorError> {
        let number = self.notifier.source().latest_block_number().await?;
        self.analyze_block_number(number).await
    }

    /// Analyze every new head until `cancel` fires.
    ///
    /// Failed cycles are logged and skipped; the loop itself never returns an
    /// error.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            poll_interval_ms = self.notifier.poll_interval().as_millis() as u64,
            max_concurrent_requests = self.analyzer.config().max_concurrent_requests,
            "Reentrancy watcher started"
        );

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = self.notifier.wait_for_new_block() => next,
            };

            match next {
                Ok(number) => {
                    let result = tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = self.analyze_block_number(number) => result,
                    };
                    if let Err(e) = result {
                        warn!(block_number = number, error = %e, "Analysis cycle failed");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to poll for the chain head");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.notifier.poll_interval()) => {}
                    }
                }
            }
        }

        info!(
            last_block_checked = self.notifier.last_block_checked(),
            "Reentrancy watcher stopped"
        );
    }
}
