//! Boundaries to the node: where blocks and call traces come from.

use std::sync::Arc;

use async_trait::async_trait;
use ethereum_types::H256;

use crate::error::RpcError;
use crate::types::{Block, CallFrame};

/// Supplies `callTracer` traces for mined transactions.
#[async_trait]
pub trait TraceSource: Send + Sync {
    /// Root frame of the transaction's call trace. A trace without a call
    /// list is returned as a frame with no children, not as an error.
    async fn trace_transaction(&self, tx_hash: H256) -> Result<CallFrame, RpcError>;
}

/// Supplies blocks with fully materialized transactions.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn latest_block_number(&self) -> Result<u64, RpcError>;

    async fn block_by_number(&self, number: u64) -> Result<Block, RpcError>;
}

#[async_trait]
impl<T: TraceSource + ?Sized> TraceSource for Arc<T> {
    async fn trace_transaction(&self, tx_hash: H256) -> Result<CallFrame, RpcError> {
        (**self).trace_transaction(tx_hash).await
    }
}

#[async_trait]
impl<B: BlockSource + ?Sized> BlockSource for Arc<B> {
    async fn latest_block_number(&self) -> Result<u64, RpcError> {
        (**self).latest_block_number().await
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, RpcError> {
        (**self).block_by_number(number).await
    }
}
