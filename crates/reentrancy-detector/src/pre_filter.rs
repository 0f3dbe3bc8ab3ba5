//! Transaction pre-filter: picks the transactions worth tracing.
//!
//! A transaction is selected when its input payload is non-empty, taken as a
//! proxy for "this transaction runs contract code". The heuristic is cheap and
//! deliberately simple; it selects plain value transfers that carry a memo in
//! their data and misses contract calls that reach a fallback with no data.
//! Replacing it with a stronger check (for example probing the recipient's code
//! size) changes which transactions are ever examined.

use crate::types::{Block, BlockTransaction};

/// Whether the transaction plausibly invokes contract code.
pub fn is_contract_call(tx: &BlockTransaction) -> bool {
    !tx.input.is_empty()
}

/// Transactions of `block` that pass [`is_contract_call`], in block order.
pub fn select_contract_calls(block: &Block) -> Vec<&BlockTransaction> {
    block
        .transactions
        .iter()
        .filter(|tx| is_contract_call(tx))
        .collect()
}
