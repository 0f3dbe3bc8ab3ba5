//! Prometheus-compatible counters for the detection pipeline.
//!
//! Lock-free `AtomicU64` counters shared between the watcher loop and the
//! orchestrator. Rendering to the text exposition format is provided; serving
//! it over HTTP is left to the embedding process.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::severity::SuspicionType;
use crate::types::BlockReport;

/// Thread-safe counters for the detector.
#[derive(Debug, Default)]
pub struct DetectorMetrics {
    blocks_analyzed: AtomicU64,
    block_retrieval_failures: AtomicU64,
    txs_selected: AtomicU64,
    txs_flagged_light: AtomicU64,
    txs_flagged_hard: AtomicU64,
    txs_unanalyzed: AtomicU64,
    analysis_total_ms: AtomicU64,
}

impl DetectorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finished block report into the counters.
    pub fn record_report(&self, report: &BlockReport, elapsed_ms: u64) {
        self.blocks_analyzed.fetch_add(1, Ordering::Relaxed);
        self.txs_selected
            .fetch_add(report.selected as u64, Ordering::Relaxed);
        self.txs_flagged_light.fetch_add(
            report.count_at(SuspicionType::Light) as u64,
            Ordering::Relaxed,
        );
        self.txs_flagged_hard.fetch_add(
            report.count_at(SuspicionType::Hard) as u64,
            Ordering::Relaxed,
        );
        self.txs_unanalyzed
            .fetch_add(report.unanalyzed.len() as u64, Ordering::Relaxed);
        self.analysis_total_ms
            .fetch_add(elapsed_ms, Ordering::Relaxed);
    }

    pub fn increment_block_retrieval_failures(&self) {
        self.block_retrieval_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters. Each field is individually accurate; the set is not
    /// read under a single fence.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_analyzed: self.blocks_analyzed.load(Ordering::Relaxed),
            block_retrieval_failures: self.block_retrieval_failures.load(Ordering::Relaxed),
            txs_selected: self.txs_selected.load(Ordering::Relaxed),
            txs_flagged_light: self.txs_flagged_light.load(Ordering::Relaxed),
            txs_flagged_hard: self.txs_flagged_hard.load(Ordering::Relaxed),
            txs_unanalyzed: self.txs_unanalyzed.load(Ordering::Relaxed),
            analysis_total_ms: self.analysis_total_ms.load(Ordering::Relaxed),
        }
    }

    pub fn to_prometheus_text(&self) -> String {
        self.snapshot().to_string()
    }
}

/// Point-in-time copy of [`DetectorMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub blocks_analyzed: u64,
    pub block_retrieval_failures: u64,
    pub txs_selected: u64,
    pub txs_flagged_light: u64,
    pub txs_flagged_hard: u64,
    pub txs_unanalyzed: u64,
    pub analysis_total_ms: u64,
}

impl fmt::Display for MetricsSnapshot {
    /// Prometheus text exposition format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counters = [
            (
                "reentrancy_blocks_analyzed_total",
                "Blocks fully analyzed",
                self.blocks_analyzed,
            ),
            (
                "reentrancy_block_retrieval_failures_total",
                "Analysis cycles aborted because the block could not be fetched",
                self.block_retrieval_failures,
            ),
            (
                "reentrancy_txs_selected_total",
                "Transactions selected as contract calls",
                self.txs_selected,
            ),
            (
                "reentrancy_txs_unanalyzed_total",
                "Selected transactions that could not be analyzed",
                self.txs_unanalyzed,
            ),
            (
                "reentrancy_analysis_ms_total",
                "Cumulative block analysis time in milliseconds",
                self.analysis_total_ms,
            ),
        ];
        for (name, help, value) in counters {
            writeln!(f, "# HELP {name} {help}")?;
            writeln!(f, "# TYPE {name} counter")?;
            writeln!(f, "{name} {value}")?;
        }

        writeln!(
            f,
            "# HELP reentrancy_txs_flagged_total Transactions flagged by suspicion level"
        )?;
        writeln!(f, "# TYPE reentrancy_txs_flagged_total counter")?;
        writeln!(
            f,
            "reentrancy_txs_flagged_total{{level=\"light\"}} {}",
            self.txs_flagged_light
        )?;
        writeln!(
            f,
            "reentrancy_txs_flagged_total{{level=\"hard\"}} {}",
            self.txs_flagged_hard
        )
    }
}

// Compile-time assertion: DetectorMetrics must be Send + Sync.
const _: fn() = || {
    fn must_be_send_sync<T: Send + Sync>() {}
    must_be_send_sync::<DetectorMetrics>();
};
