//! Block analysis orchestrator.
//!
//! Selects a block's contract calls, fetches their traces with bounded
//! concurrency, and runs the call-stack analyzer on each one as soon as its
//! trace arrives. All fan-out happens on the caller's task: a transaction's
//! unit suspends only while awaiting its trace, and the traversal that follows
//! runs to completion without yielding. Each traversal owns its own calling
//! context, so nothing here is shared or locked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{StreamExt, stream};
use tracing::{debug, info, warn};

use crate::analyzer::{CallStackAnalyzer, DEFAULT_MAX_DEPTH};
use crate::error::{AnalysisError, RpcError};
use crate::metrics::DetectorMetrics;
use crate::pre_filter::select_contract_calls;
use crate::severity::SuspicionType;
use crate::source::TraceSource;
use crate::types::{
    Block, BlockReport, BlockTransaction, SuspectedReentrancy, UnanalyzedReason, UnanalyzedTx,
};

/// Configuration for per-block analysis.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Maximum trace requests in flight per block (default: 16).
    pub max_concurrent_requests: usize,
    /// Deadline for a single trace request, retries included (default: 45s).
    pub request_timeout: Duration,
    /// Deepest call frame the analyzer accepts (default: 1024).
    pub max_depth: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 16,
            request_timeout: Duration::from_secs(45),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// What happened to one selected transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Clean,
    Suspected(SuspectedReentrancy),
    Unanalyzed(UnanalyzedTx),
}

/// Runs reentrancy analysis over whole blocks.
pub struct BlockAnalyzer<T> {
    source: T,
    analyzer: CallStackAnalyzer,
    config: AnalysisConfig,
    metrics: Option<Arc<DetectorMetrics>>,
}

impl<T: TraceSource> BlockAnalyzer<T> {
    pub fn new(source: T, config: AnalysisConfig) -> Self {
        Self {
            source,
            analyzer: CallStackAnalyzer::new(config.max_depth),
            config,
            metrics: None,
        }
    }

    /// Record every analyzed block into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<DetectorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze every selected transaction of `block`.
    ///
    /// Suspects and unanalyzed transactions are reported in block order.
    /// A failing transaction never aborts the rest of the block.
    pub async fn analyze_block(&self, block: &Block) -> BlockReport {
        let started = Instant::now();
        let selected = select_contract_calls(block);
        debug!(
            block_number = block.number,
            total = block.transactions.len(),
            selected = selected.len(),
            "Analyzing block"
        );

        // A slot frees as soon as its own trace is done; block order is
        // restored afterwards.
        let mut outcomes: Vec<(usize, TxOutcome)> =
            stream::iter(selected.iter().copied().enumerate())
                .map(|(index, tx)| async move { (index, self.analyze_transaction(tx).await) })
                .buffer_unordered(self.config.max_concurrent_requests.max(1))
                .collect()
                .await;
        outcomes.sort_unstable_by_key(|(index, _)| *index);

        let mut report = BlockReport {
            block_number: block.number,
            block_hash: block.hash,
            selected: selected.len(),
            ..Default::default()
        };
        for (_, outcome) in outcomes {
            match outcome {
                TxOutcome::Clean => {}
                TxOutcome::Suspected(suspect) => report.suspects.push(suspect),
                TxOutcome::Unanalyzed(unanalyzed) => report.unanalyzed.push(unanalyzed),
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if let Some(metrics) = &self.metrics {
            metrics.record_report(&report, elapsed_ms);
        }
        info!(
            block_number = report.block_number,
            selected = report.selected,
            suspects = report.suspects.len(),
            unanalyzed = report.unanalyzed.len(),
            elapsed_ms,
            "Block analyzed"
        );
        report
    }

    /// Fetch one transaction's trace and classify it.
    pub async fn analyze_transaction(&self, tx: &BlockTransaction) -> TxOutcome {
        let tx_hash = tx.hash;
        let request = self.source.trace_transaction(tx_hash);
        let trace = match tokio::time::timeout(self.config.request_timeout, request).await {
            Ok(Ok(trace)) => trace,
            Ok(Err(RpcError::ResponseTooDeep { nesting, .. })) => {
                let max_depth = self.config.max_depth;
                warn!(
                    tx = %format!("0x{tx_hash:x}"),
                    nesting,
                    max_depth,
                    "Trace too deep to decode"
                );
                return TxOutcome::Unanalyzed(UnanalyzedTx {
                    tx_hash,
                    reason: UnanalyzedReason::TraceTooDeep { max_depth },
                });
            }
            Ok(Err(err)) => {
                warn!(tx = %format!("0x{tx_hash:x}"), error = %err, "Trace retrieval failed");
                return TxOutcome::Unanalyzed(UnanalyzedTx {
                    tx_hash,
                    reason: UnanalyzedReason::Retrieval {
                        error: err.to_string(),
                    },
                });
            }
            Err(_elapsed) => {
                let after_ms = self.config.request_timeout.as_millis() as u64;
                warn!(tx = %format!("0x{tx_hash:x}"), after_ms, "Trace request timed out");
                return TxOutcome::Unanalyzed(UnanalyzedTx {
                    tx_hash,
                    reason: UnanalyzedReason::Timeout { after_ms },
                });
            }
        };

        match self.analyzer.analyze(&trace) {
            Ok(SuspicionType::None) => TxOutcome::Clean,
            Ok(suspicion) => {
                debug!(tx = %format!("0x{tx_hash:x}"), %suspicion, "Reentrancy suspected");
                TxOutcome::Suspected(SuspectedReentrancy { tx_hash, suspicion })
            }
            Err(AnalysisError::TraceTooDeep { max_depth }) => {
                warn!(tx = %format!("0x{tx_hash:x}"), max_depth, "Trace too deep to analyze");
                TxOutcome::Unanalyzed(UnanalyzedTx {
                    tx_hash,
                    reason: UnanalyzedReason::TraceTooDeep { max_depth },
                })
            }
        }
    }
}
