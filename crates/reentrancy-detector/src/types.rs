//! Core data types: blocks, call traces, and analysis results.

use std::fmt;

use bytes::Bytes;
use ethereum_types::{Address, H256};
use serde::{Deserialize, Serialize};

use crate::severity::SuspicionType;

/// Number of leading input bytes that identify the called function.
pub const SELECTOR_LEN: usize = 4;

/// A block as returned by `eth_getBlockByNumber(<tag>, true)`.
///
/// Only the fields the detector needs are decoded; everything else in the
/// RPC response is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(with = "hex_u64")]
    pub number: u64,
    pub hash: H256,
    #[serde(default)]
    pub transactions: Vec<BlockTransaction>,
}

/// A fully materialized transaction inside a [`Block`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTransaction {
    pub hash: H256,
    #[serde(default, with = "hex_bytes")]
    pub input: Bytes,
}

/// One node of a `callTracer` trace: an external call and the calls it made,
/// in execution order.
///
/// Missing `input` decodes as empty and a missing or `null` `calls` list
/// decodes as no children, so partial traces never fail on shape alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFrame {
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default, with = "hex_bytes")]
    pub input: Bytes,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub calls: Vec<CallFrame>,
}

impl CallFrame {
    pub fn new(to: Address, input: impl Into<Bytes>, calls: Vec<CallFrame>) -> Self {
        Self {
            to: Some(to),
            input: input.into(),
            calls,
        }
    }

    /// The function selector this call invokes.
    pub fn selector(&self) -> Selector {
        Selector::from_input(&self.input)
    }
}

/// Leading bytes of a call's input, identifying the invoked function.
///
/// Inputs shorter than four bytes (including empty inputs that hit a
/// fallback or receive function) keep whatever prefix they have, so they
/// remain distinct from each other and from full selectors.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Selector(Bytes);

impl Selector {
    pub fn from_input(input: &Bytes) -> Self {
        Self(input.slice(..input.len().min(SELECTOR_LEN)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; SELECTOR_LEN]> for Selector {
    fn from(bytes: [u8; SELECTOR_LEN]) -> Self {
        Self(Bytes::copy_from_slice(&bytes))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({self})")
    }
}

/// A transaction whose call tree showed reentrancy-like structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspectedReentrancy {
    pub tx_hash: H256,
    pub suspicion: SuspicionType,
}

/// A selected transaction that could not be analyzed.
///
/// Kept separate from clean transactions so that "no finding" and
/// "not looked at" are never conflated in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnanalyzedTx {
    pub tx_hash: H256,
    pub reason: UnanalyzedReason,
}

/// Why a transaction ended up unanalyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnanalyzedReason {
    /// The trace request did not complete within the per-request timeout.
    Timeout { after_ms: u64 },
    /// The trace source returned an error.
    Retrieval { error: String },
    /// The call tree was deeper than the analyzer accepts.
    TraceTooDeep { max_depth: usize },
}

impl fmt::Display for UnanalyzedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { after_ms } => write!(f, "trace request timed out after {after_ms}ms"),
            Self::Retrieval { error } => write!(f, "trace retrieval failed: {error}"),
            Self::TraceTooDeep { max_depth } => {
                write!(f, "trace deeper than {max_depth} frames")
            }
        }
    }
}

/// Result of analyzing one block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReport {
    pub block_number: u64,
    pub block_hash: H256,
    /// Number of transactions that passed the contract-call pre-filter.
    pub selected: usize,
    /// Flagged transactions, in block order.
    pub suspects: Vec<SuspectedReentrancy>,
    /// Selected transactions that could not be analyzed, in block order.
    pub unanalyzed: Vec<UnanalyzedTx>,
}

impl BlockReport {
    /// True only when every selected transaction was analyzed and none was
    /// flagged.
    pub fn is_clean(&self) -> bool {
        self.suspects.is_empty() && self.unanalyzed.is_empty()
    }

    pub fn count_at(&self, level: SuspicionType) -> usize {
        self.suspects
            .iter()
            .filter(|s| s.suspicion == level)
            .count()
    }
}

// --- Serde helpers for JSON-RPC hex encodings ---

pub(crate) mod hex_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(Bytes::new());
        };
        let digits = raw.strip_prefix("0x").unwrap_or(&raw);
        hex::decode(digits).map(Bytes::from).map_err(D::Error::custom)
    }
}

pub(crate) mod hex_u64 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{value:x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<u64, std::num::ParseIntError> {
        u64::from_str_radix(raw.trim_start_matches("0x"), 16)
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
