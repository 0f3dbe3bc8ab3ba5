//! Report consumers.
//!
//! ```text
//!   BlockReport
//!     -> ReportDispatcher        (fan-out in registration order)
//!        -> LogReportHandler     (tracing events)
//!        -> StdoutReportHandler  (one human-readable line per finding)
//!        -> JsonlFileReportHandler
//! ```

use std::io::Write;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::types::BlockReport;

/// Callback trait for consuming block reports.
pub trait ReportHandler: Send + Sync {
    fn on_report(&self, report: &BlockReport);
}

/// Human-readable lines for a report: flagged transactions first, then the
/// ones that could not be analyzed. Clean blocks produce no lines.
pub fn format_report_lines(report: &BlockReport) -> Vec<String> {
    let suspects = report.suspects.iter().map(|s| {
        format!(
            "transaction: 0x{:x}, suspicion_level: {}",
            s.tx_hash, s.suspicion
        )
    });
    let unanalyzed = report
        .unanalyzed
        .iter()
        .map(|u| format!("transaction: 0x{:x}, unanalyzed: {}", u.tx_hash, u.reason));
    suspects.chain(unanalyzed).collect()
}

/// Dispatches a report to multiple downstream handlers.
#[derive(Default)]
pub struct ReportDispatcher {
    handlers: Vec<Box<dyn ReportHandler>>,
}

impl ReportDispatcher {
    pub fn add_handler(&mut self, handler: Box<dyn ReportHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl ReportHandler for ReportDispatcher {
    fn on_report(&self, report: &BlockReport) {
        for handler in &self.handlers {
            handler.on_report(report);
        }
    }
}

/// Emits structured `tracing` events for every finding.
pub struct LogReportHandler;

impl ReportHandler for LogReportHandler {
    fn on_report(&self, report: &BlockReport) {
        for suspect in &report.suspects {
            warn!(
                block_number = report.block_number,
                tx = %format!("0x{:x}", suspect.tx_hash),
                level = %suspect.suspicion,
                "Suspected reentrancy"
            );
        }
        for unanalyzed in &report.unanalyzed {
            warn!(
                block_number = report.block_number,
                tx = %format!("0x{:x}", unanalyzed.tx_hash),
                reason = %unanalyzed.reason,
                "Transaction not analyzed"
            );
        }
        if report.is_clean() {
            info!(
                block_number = report.block_number,
                selected = report.selected,
                "No reentrancy suspected"
            );
        }
    }
}

/// Prints [`format_report_lines`] to stdout.
pub struct StdoutReportHandler;

impl ReportHandler for StdoutReportHandler {
    fn on_report(&self, report: &BlockReport) {
        for line in format_report_lines(report) {
            println!("{line}");
        }
    }
}

/// Appends each report as a single JSON line to a file.
///
/// The file is opened in append mode on every write so it can be rotated
/// externally between writes.
pub struct JsonlFileReportHandler {
    path: PathBuf,
}

impl JsonlFileReportHandler {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn append(&self, report: &BlockReport) -> std::io::Result<()> {
        let json = serde_json::to_string(report)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")
    }
}

impl ReportHandler for JsonlFileReportHandler {
    fn on_report(&self, report: &BlockReport) {
        if let Err(e) = self.append(report) {
            warn!(
                path = %self.path.display(),
                block_number = report.block_number,
                error = %e,
                "Failed to write report"
            );
        }
    }
}
