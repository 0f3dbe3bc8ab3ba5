//! Thin async JSON-RPC HTTP client for Ethereum nodes with `debug_*` tracing.
//!
//! Supports configurable timeouts, exponential backoff retry, and
//! rate-limit awareness (HTTP 429 + Retry-After).

use std::time::Duration;

use async_trait::async_trait;
use ethereum_types::H256;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::analyzer::DEFAULT_MAX_DEPTH;
use crate::error::RpcError;
use crate::source::{BlockSource, TraceSource};
use crate::types::{Block, CallFrame, hex_u64};

/// JSON nesting needed to carry a `callTracer` trace whose frames reach
/// `max_depth`, plus the first frame beyond it.
///
/// The envelope and root frame take one level each and every deeper frame
/// adds two (its parent's `calls` array and its own object).
pub fn response_nesting_limit(max_depth: usize) -> usize {
    max_depth.saturating_add(2).saturating_mul(2)
}

/// Configuration for RPC client behavior.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Per-request timeout (default: 30s).
    pub timeout: Duration,
    /// TCP connect timeout (default: 10s).
    pub connect_timeout: Duration,
    /// Maximum retry attempts for transient errors (default: 3).
    pub max_retries: u32,
    /// Base backoff duration, doubled on each retry (default: 1s).
    pub base_backoff: Duration,
    /// Deepest JSON nesting accepted in a response body
    /// (default: `response_nesting_limit(DEFAULT_MAX_DEPTH)`).
    pub max_response_nesting: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
            max_response_nesting: response_nesting_limit(DEFAULT_MAX_DEPTH),
        }
    }
}

/// Minimal Ethereum JSON-RPC client.
#[derive(Debug, Clone)]
pub struct EthRpcClient {
    http: reqwest::Client,
    url: String,
    config: RpcConfig,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    #[serde(default = "unknown_code")]
    code: i64,
    #[serde(default)]
    message: String,
}

fn unknown_code() -> i64 {
    -1
}

impl EthRpcClient {
    pub fn new(url: &str) -> Self {
        Self::with_config(url, RpcConfig::default())
    }

    pub fn with_config(url: &str, config: RpcConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            url: url.to_string(),
            config,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    pub async fn eth_block_number(&self) -> Result<u64, RpcError> {
        const METHOD: &str = "eth_blockNumber";
        let raw: String = self
            .rpc_call(METHOD, json!([]))
            .await?
            .ok_or_else(|| RpcError::NotFound {
                method: METHOD.into(),
                what: "latest block number".into(),
            })?;
        hex_u64::parse(&raw).map_err(|e| RpcError::ParseError {
            method: METHOD.into(),
            field: "result".into(),
            cause: e.to_string(),
        })
    }

    /// Fetch a block with full transaction objects.
    pub async fn eth_get_block_by_number(&self, number: u64) -> Result<Block, RpcError> {
        const METHOD: &str = "eth_getBlockByNumber";
        let tag = format!("0x{number:x}");
        self.rpc_call(METHOD, json!([tag, true]))
            .await?
            .ok_or_else(|| RpcError::NotFound {
                method: METHOD.into(),
                what: format!("block {tag}"),
            })
    }

    /// Fetch the `callTracer` trace of a mined transaction. A `null` result is
    /// treated as a trace with no calls.
    pub async fn debug_trace_transaction(&self, tx_hash: H256) -> Result<CallFrame, RpcError> {
        let frame: Option<CallFrame> = self
            .rpc_call(
                "debug_traceTransaction",
                json!([format!("0x{tx_hash:x}"), { "tracer": "callTracer" }]),
            )
            .await?;
        Ok(frame.unwrap_or_default())
    }

    /// Execute a JSON-RPC call with retry and backoff.
    async fn rpc_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let max_attempts = self.config.max_retries + 1; // 1 initial + N retries
        let mut attempt = 0;
        loop {
            let err = match self.rpc_call_once(method, &body).await {
                Ok(result) => return Ok(result),
                Err(err) => err,
            };
            attempt += 1;

            if !err.is_retryable() || attempt >= max_attempts {
                if attempt > 1 {
                    return Err(RpcError::RetryExhausted {
                        method: method.into(),
                        attempts: attempt,
                        last_error: Box::new(err),
                    });
                }
                return Err(err);
            }

            // Exponential backoff: base * 2^(attempt-1), unless the server
            // told us how long to wait.
            let backoff = err
                .retry_after_secs()
                .map(Duration::from_secs)
                .unwrap_or_else(|| self.config.base_backoff * 2u32.saturating_pow(attempt - 1));
            debug!(method, attempt, backoff_ms = backoff.as_millis() as u64, error = %err, "retrying RPC call");
            tokio::time::sleep(backoff).await;
        }
    }

    /// Single attempt at an RPC call (no retry).
    async fn rpc_call_once<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<Option<T>, RpcError> {
        let response = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(method, &e))?;

        let status = response.status();
        if !status.is_success() {
            // Only the delay-seconds form of Retry-After is understood.
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let body = response.text().await.unwrap_or_default();

            return Err(RpcError::HttpError {
                method: method.into(),
                status: status.as_u16(),
                body,
                retry_after,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(method, &e))?;
        parse_response(method, &bytes, self.config.max_response_nesting)
    }

    fn transport_error(&self, method: &str, e: &reqwest::Error) -> RpcError {
        if e.is_timeout() {
            RpcError::Timeout {
                method: method.into(),
                elapsed_ms: self.config.timeout.as_millis() as u64,
            }
        } else {
            RpcError::ConnectionFailed {
                url: self.url.clone(),
                cause: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl TraceSource for EthRpcClient {
    async fn trace_transaction(&self, tx_hash: H256) -> Result<CallFrame, RpcError> {
        self.debug_trace_transaction(tx_hash).await
    }
}

#[async_trait]
impl BlockSource for EthRpcClient {
    async fn latest_block_number(&self) -> Result<u64, RpcError> {
        self.eth_block_number().await
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, RpcError> {
        self.eth_get_block_by_number(number).await
    }
}

// --- Parsing helpers ---

/// Decode a JSON-RPC response envelope.
///
/// serde_json's built-in recursion limit (128) is lifted because call traces
/// nest two levels per frame; `max_nesting` is enforced by a pre-scan instead.
fn parse_response<T: DeserializeOwned>(
    method: &str,
    body: &[u8],
    max_nesting: usize,
) -> Result<Option<T>, RpcError> {
    let nesting = json_nesting_depth(body);
    if nesting > max_nesting {
        return Err(RpcError::ResponseTooDeep {
            method: method.into(),
            nesting,
            limit: max_nesting,
        });
    }

    let mut deserializer = serde_json::Deserializer::from_slice(body);
    deserializer.disable_recursion_limit();
    let response = JsonRpcResponse::<T>::deserialize(&mut deserializer)
        .and_then(|response| deserializer.end().map(|()| response))
        .map_err(|e| RpcError::ParseError {
            method: method.into(),
            field: "response_body".into(),
            cause: e.to_string(),
        })?;

    if let Some(error) = response.error {
        return Err(RpcError::JsonRpcError {
            method: method.into(),
            code: error.code,
            message: error.message,
        });
    }
    Ok(response.result)
}

/// Maximum bracket nesting of a JSON document, ignoring string contents.
fn json_nesting_depth(body: &[u8]) -> usize {
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for &byte in body {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max_depth
}
