//! Shared fixtures: in-memory chain and trace sources, call-tree builders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use ethereum_types::{Address, H256};

use crate::error::RpcError;
use crate::report::ReportHandler;
use crate::source::{BlockSource, TraceSource};
use crate::types::{Block, BlockReport, BlockTransaction, CallFrame};

pub const SEL_A: [u8; 4] = [0xaa, 0xaa, 0xaa, 0xaa];
pub const SEL_B: [u8; 4] = [0xbb, 0xbb, 0xbb, 0xbb];

/// Address of the top-level caller in every fixture trace.
pub const EOA: u64 = 0xa0;
pub const CONTRACT_B: u64 = 0xb0;

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn hash(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

pub fn call(to: u64, selector: [u8; 4], calls: Vec<CallFrame>) -> CallFrame {
    CallFrame::new(addr(to), selector.to_vec(), calls)
}

/// Root frame as returned by `callTracer`.
pub fn root(calls: Vec<CallFrame>) -> CallFrame {
    CallFrame {
        to: Some(addr(EOA)),
        input: Bytes::new(),
        calls,
    }
}

/// A calls B.0xaaaaaaaa; nothing nested.
pub fn single_call_trace() -> CallFrame {
    root(vec![call(CONTRACT_B, SEL_A, vec![])])
}

/// A calls B.0xaaaaaaaa, which re-enters B.0xaaaaaaaa.
pub fn hard_trace() -> CallFrame {
    root(vec![call(
        CONTRACT_B,
        SEL_A,
        vec![call(CONTRACT_B, SEL_A, vec![])],
    )])
}

/// A calls B.0xaaaaaaaa, which enters B.0xbbbbbbbb.
pub fn light_trace() -> CallFrame {
    root(vec![call(
        CONTRACT_B,
        SEL_A,
        vec![call(CONTRACT_B, SEL_B, vec![])],
    )])
}

pub fn tx(n: u64, input: &'static [u8]) -> BlockTransaction {
    BlockTransaction {
        hash: hash(n),
        input: Bytes::from_static(input),
    }
}

pub fn block(number: u64, transactions: Vec<BlockTransaction>) -> Block {
    Block {
        number,
        hash: hash(0xb10c_0000 + number),
        transactions,
    }
}

/// Trace source backed by a map; unknown hashes yield an empty trace.
#[derive(Default)]
pub struct MapTraceSource {
    traces: HashMap<H256, Result<CallFrame, String>>,
    requested: Mutex<Vec<H256>>,
}

impl MapTraceSource {
    pub fn with_trace(mut self, tx_hash: H256, frame: CallFrame) -> Self {
        self.traces.insert(tx_hash, Ok(frame));
        self
    }

    pub fn with_failure(mut self, tx_hash: H256, cause: &str) -> Self {
        self.traces.insert(tx_hash, Err(cause.to_string()));
        self
    }

    pub fn requested(&self) -> Vec<H256> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl TraceSource for MapTraceSource {
    async fn trace_transaction(&self, tx_hash: H256) -> Result<CallFrame, RpcError> {
        self.requested.lock().unwrap().push(tx_hash);
        match self.traces.get(&tx_hash) {
            Some(Ok(frame)) => Ok(frame.clone()),
            Some(Err(cause)) => Err(RpcError::ConnectionFailed {
                url: "http://trace-source".into(),
                cause: cause.clone(),
            }),
            None => Ok(CallFrame::default()),
        }
    }
}

/// Fixed set of blocks with a fixed head.
pub struct StaticChain {
    pub head: u64,
    pub blocks: HashMap<u64, Block>,
}

impl StaticChain {
    pub fn new(blocks: Vec<Block>) -> Self {
        let head = blocks.iter().map(|b| b.number).max().unwrap_or_default();
        Self {
            head,
            blocks: blocks.into_iter().map(|b| (b.number, b)).collect(),
        }
    }
}

#[async_trait]
impl BlockSource for StaticChain {
    async fn latest_block_number(&self) -> Result<u64, RpcError> {
        Ok(self.head)
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, RpcError> {
        self.blocks
            .get(&number)
            .cloned()
            .ok_or_else(|| RpcError::NotFound {
                method: "eth_getBlockByNumber".into(),
                what: format!("block {number}"),
            })
    }
}

/// Keeps every report it receives.
#[derive(Clone, Default)]
pub struct CollectingHandler(pub Arc<Mutex<Vec<BlockReport>>>);

impl CollectingHandler {
    pub fn reports(&self) -> Vec<BlockReport> {
        self.0.lock().unwrap().clone()
    }
}

impl ReportHandler for CollectingHandler {
    fn on_report(&self, report: &BlockReport) {
        self.0.lock().unwrap().push(report.clone());
    }
}
