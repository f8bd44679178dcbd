use crate::types::{BlockTarget, Chain};
use alloy::primitives::{Address, B256};
use std::fmt;
use thiserror::Error;

/// Why a provider rejected an `eth_getLogs` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogsErrorKind {
    RangeTooLarge,
    ResultSetTooLarge,
    RateLimited,
    Timeout,
    Other,
}

impl LogsErrorKind {
    /// Rejections that a narrower block range may avoid.
    pub fn is_splittable(&self) -> bool {
        !matches!(self, LogsErrorKind::Other)
    }
}

impl fmt::Display for LogsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogsErrorKind::RangeTooLarge => "block range too large",
            LogsErrorKind::ResultSetTooLarge => "result set too large",
            LogsErrorKind::RateLimited => "rate limited",
            LogsErrorKind::Timeout => "timeout",
            LogsErrorKind::Other => "provider error",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct LogsError {
    pub kind: LogsErrorKind,
    pub message: String,
}

impl LogsError {
    pub fn new(kind: LogsErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("invalid block range {from_block}..={to_block} for {address}")]
    InvalidRange {
        address: Address,
        from_block: u64,
        to_block: u64,
    },
    #[error("logs for {address} still failing at single block {block}: {source}")]
    Exhausted {
        address: Address,
        block: u64,
        #[source]
        source: LogsError,
    },
    #[error("logs for {address} in blocks {from_block}..={to_block} failed: {source}")]
    Provider {
        address: Address,
        from_block: u64,
        to_block: BlockTarget,
        #[source]
        source: LogsError,
    },
    #[error("could not resolve chain head while splitting logs for {address}: {source}")]
    Head {
        address: Address,
        #[source]
        source: LogsError,
    },
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("{event}: expected {expected} topic(s), found {found}")]
    TopicCount {
        event: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{event}: topic0 {found} does not match signature {expected}")]
    Signature {
        event: &'static str,
        expected: B256,
        found: B256,
    },
    #[error("{event}: malformed data: {source}")]
    Abi {
        event: &'static str,
        #[source]
        source: alloy::sol_types::Error,
    },
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error("log from {address} at block {block} index {log_index}: {source}")]
    Decode {
        address: Address,
        block: String,
        log_index: String,
        #[source]
        source: DecodeError,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("batch call failed: {0}")]
pub struct BatchCallError(pub String);

#[derive(Error, Debug)]
pub enum AggregationError {
    #[error(transparent)]
    Batch(#[from] BatchCallError),
    #[error("batch returned {found} results for {expected} calls")]
    LengthMismatch { expected: usize, found: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing RPC for {chain} ({env_key})")]
    MissingRpc { chain: Chain, env_key: &'static str },
    #[error("invalid RPC url for {chain} ({env_key}): {url}")]
    InvalidRpcUrl {
        chain: Chain,
        env_key: &'static str,
        url: String,
    },
    #[error("unknown chain: {0}")]
    UnknownChain(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    CommunityDiscovery,
    PoolDiscovery,
    BalanceAggregation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Setup => "setup",
            Phase::CommunityDiscovery => "community discovery",
            Phase::PoolDiscovery => "pool discovery",
            Phase::BalanceAggregation => "balance aggregation",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum TvlError {
    #[error("{chain} ({phase}): {source}", phase = Phase::Setup)]
    Configuration {
        chain: Chain,
        #[source]
        source: ConfigError,
    },
    #[error("{chain} ({phase}): {source}")]
    Discovery {
        chain: Chain,
        phase: Phase,
        #[source]
        source: DiscoveryError,
    },
    #[error("{chain} ({phase}): {source}", phase = Phase::BalanceAggregation)]
    Aggregation {
        chain: Chain,
        #[source]
        source: AggregationError,
    },
}

impl TvlError {
    pub fn chain(&self) -> Chain {
        match self {
            TvlError::Configuration { chain, .. }
            | TvlError::Discovery { chain, .. }
            | TvlError::Aggregation { chain, .. } => *chain,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            TvlError::Configuration { .. } => Phase::Setup,
            TvlError::Discovery { phase, .. } => *phase,
            TvlError::Aggregation { .. } => Phase::BalanceAggregation,
        }
    }
}
