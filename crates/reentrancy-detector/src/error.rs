//! Error types for the reentrancy detector.

/// Top-level error for a single watch cycle.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("{0}")]
    Rpc(#[from] RpcError),

    #[error("Block {block_number} could not be retrieved: {source}")]
    BlockRetrieval {
        block_number: u64,
        #[source]
        source: RpcError,
    },
}

/// HTTP statuses a node (or the proxy in front of it) answers with while
/// overloaded or restarting.
const TRANSIENT_HTTP_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Failures talking to the Ethereum node.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Cannot reach node at {url}: {cause}")]
    ConnectionFailed { url: String, cause: String },

    #[error("No answer to {method} within {elapsed_ms}ms")]
    Timeout { method: String, elapsed_ms: u64 },

    #[error("Node answered {method} with HTTP {status}: {body}")]
    HttpError {
        method: String,
        status: u16,
        body: String,
        /// Seconds from the `Retry-After` header, when present.
        retry_after: Option<u64>,
    },

    #[error("Node rejected {method} with code {code}: {message}")]
    JsonRpcError {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Undecodable {method} response, {field}: {cause}")]
    ParseError {
        method: String,
        field: String,
        cause: String,
    },

    /// The body nests deeper than the client accepts. For traces this means
    /// the call tree is deeper than the analyzer's depth bound.
    #[error("{method} response nests {nesting} levels, limit is {limit}")]
    ResponseTooDeep {
        method: String,
        nesting: usize,
        limit: usize,
    },

    #[error("Node has no {what} ({method} returned null)")]
    NotFound { method: String, what: String },

    #[error("{method} gave up after {attempts} attempt(s), last error: {last_error}")]
    RetryExhausted {
        method: String,
        attempts: u32,
        last_error: Box<RpcError>,
    },
}

impl RpcError {
    /// Whether sending the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::ConnectionFailed { .. } | RpcError::Timeout { .. } => true,
            RpcError::HttpError { status, .. } => TRANSIENT_HTTP_STATUSES.contains(status),
            _ => false,
        }
    }

    /// Wait requested by a rate-limiting node. Only honoured on HTTP 429.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            RpcError::HttpError {
                status: 429,
                retry_after,
                ..
            } => *retry_after,
            _ => None,
        }
    }
}

/// Errors raised while walking a single call trace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Call trace exceeds the maximum analyzable depth of {max_depth}")]
    TraceTooDeep { max_depth: usize },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
