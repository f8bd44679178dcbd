use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::eth::Log;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Xdai,
    Arbitrum,
    Base,
    Optimism,
    Polygon,
    Celo,
}

impl Chain {
    pub const ALL: [Chain; 6] = [
        Chain::Xdai,
        Chain::Arbitrum,
        Chain::Base,
        Chain::Optimism,
        Chain::Polygon,
        Chain::Celo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Chain::Xdai => "xdai",
            Chain::Arbitrum => "arbitrum",
            Chain::Base => "base",
            Chain::Optimism => "optimism",
            Chain::Polygon => "polygon",
            Chain::Celo => "celo",
        }
    }

    /// Environment variable holding the RPC endpoint for this chain.
    pub fn rpc_env_key(&self) -> &'static str {
        match self {
            Chain::Xdai => "XDAI_RPC",
            Chain::Arbitrum => "ARBITRUM_RPC",
            Chain::Base => "BASE_RPC",
            Chain::Optimism => "OPTIMISM_RPC",
            Chain::Polygon => "POLYGON_RPC",
            Chain::Celo => "CELO_RPC",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chain {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Chain::ALL
            .into_iter()
            .find(|chain| chain.name() == wanted)
            .ok_or_else(|| crate::error::ConfigError::UnknownChain(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain: Chain,
    pub factory_addresses: Vec<Address>,
    pub deployed_from_block: u64,
}

impl ChainConfig {
    /// Config for a chain with no recorded factories. Discovery on it yields nothing.
    pub fn empty(chain: Chain) -> Self {
        Self {
            chain,
            factory_addresses: vec![],
            deployed_from_block: 1,
        }
    }
}

/// Upper bound of a log query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTarget {
    Number(u64),
    Latest,
}

impl fmt::Display for BlockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTarget::Number(n) => write!(f, "{}", n),
            BlockTarget::Latest => f.write_str("latest"),
        }
    }
}

impl From<u64> for BlockTarget {
    fn from(n: u64) -> Self {
        BlockTarget::Number(n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub topic0: B256,
    pub from_block: u64,
    pub to_block: BlockTarget,
}

impl LogQuery {
    pub fn new(address: Address, topic0: B256, from_block: u64, to_block: impl Into<BlockTarget>) -> Self {
        Self {
            address,
            topic0,
            from_block,
            to_block: to_block.into(),
        }
    }
}

/// A log entry as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
}

impl From<Log> for RawLog {
    fn from(log: Log) -> Self {
        Self {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number,
            log_index: log.log_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommunityCreatedEvent {
    pub registry_community: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolMetadata {
    /// Decimal string of the `protocol` field.
    pub protocol: String,
    pub pointer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolCreatedEvent {
    /// Decimal string; pool ids are uint256 on chain.
    pub pool_id: String,
    pub strategy: Address,
    pub community: Address,
    pub token: Address,
    pub metadata: PoolMetadata,
}

/// A discovered pool. Unique per `(strategy, token)`.
pub type Pool = PoolCreatedEvent;

impl PoolCreatedEvent {
    pub fn key(&self) -> (Address, Address) {
        (self.strategy, self.token)
    }
}

/// One `balanceOf(holder)` read against `token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceCall {
    pub token: Address,
    pub holder: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceObservation {
    pub token: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// A log carrying the subscribed topic that fails to decode aborts the run.
    #[default]
    Strict,
    /// Such logs are logged and dropped.
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub max_concurrent_requests: usize,
    pub rate_limit_backoff_ms: u64,
    pub decode_policy: DecodePolicy,
    pub multicall_batch_size: usize,
    pub multicall_address: Address,
}

/// Multicall3, deployed at the same address on every supported chain.
pub const MULTICALL3_ADDRESS: Address =
    alloy::primitives::address!("cA11bde05977b3631167028862bE2a173976CA11");

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 4,
            rate_limit_backoff_ms: 250,
            decode_policy: DecodePolicy::Strict,
            multicall_batch_size: 500,
            multicall_address: MULTICALL3_ADDRESS,
        }
    }
}
