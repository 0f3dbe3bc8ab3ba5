//! Reentrancy Sentinel
//!
//! Inspects freshly mined blocks for call patterns consistent with reentrancy:
//! a contract function being entered again while an earlier invocation on the
//! same contract is still on the call stack. Each contract-invoking transaction
//! is traced with `callTracer`, its call tree is walked, and a per-transaction
//! suspicion level (`NONE < LIGHT < HARD`) is produced for human review.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod orchestrator;
pub mod pre_filter;
pub mod report;
pub mod rpc_client;
pub mod service;
pub mod severity;
pub mod source;
pub mod types;

pub use analyzer::{CallStackAnalyzer, CallingContext};
pub use config::SentinelFullConfig;
pub use error::{AnalysisError, ConfigError, DetectorError, RpcError};
pub use metrics::DetectorMetrics;
pub use notifier::PollingBlockNotifier;
pub use orchestrator::{AnalysisConfig, BlockAnalyzer, TxOutcome};
pub use report::ReportHandler;
pub use rpc_client::EthRpcClient;
pub use service::ReentrancyWatcher;
pub use severity::SuspicionType;
pub use source::{BlockSource, TraceSource};
pub use types::{
    Block, BlockReport, BlockTransaction, CallFrame, Selector, SuspectedReentrancy,
    UnanalyzedReason, UnanalyzedTx,
};

#[cfg(test)]
mod tests;
