use crate::error::ConfigError;
use crate::types::{Chain, ChainConfig, Settings};
use alloy::primitives::{address, Address};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Format of each chain entry in chains.json (camelCase).
#[derive(serde::Deserialize)]
struct ChainEntry {
    factories: Vec<Address>,
    #[serde(rename = "deployedBlock")]
    deployed_block: Option<u64>,
}

/// Root format of chains.json: { "chains": { "xdai": {...} }, "settings": {...} }
#[derive(serde::Deserialize)]
struct ChainsFile {
    chains: HashMap<Chain, ChainEntry>,
    #[serde(default)]
    settings: Settings,
}

/// Immutable chain → factory table. Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: HashMap<Chain, ChainConfig>,
    settings: Settings,
}

impl ChainRegistry {
    pub fn new(configs: impl IntoIterator<Item = ChainConfig>, settings: Settings) -> Self {
        Self {
            chains: configs.into_iter().map(|c| (c.chain, c)).collect(),
            settings,
        }
    }

    /// The factories the Gardens deployments were made from.
    pub fn builtin() -> Self {
        let entry = |chain, factory: Address, deployed_from_block| ChainConfig {
            chain,
            factory_addresses: vec![factory],
            deployed_from_block,
        };
        Self::new(
            [
                entry(Chain::Xdai, address!("08df82f74d1f56f650e98da2dd4240f1a31711bc"), 36_032_425),
                entry(Chain::Arbitrum, address!("c1c2e092b7dbc8413e1ac02e92c161b0bda783f6"), 251_465_094),
                entry(Chain::Base, address!("c93830dd463516ed5f28f6cd4f837173b87ff389"), 26_188_356),
                entry(Chain::Optimism, address!("1fac47cf25f1ca9f20ba366099d26b28401f5715"), 125_112_017),
                entry(Chain::Polygon, address!("57a9835b204dbcc101dbf981625a3625e8043b9c"), 61_584_767),
                entry(Chain::Celo, address!("a71023bc64c9711c2037ab491de80fd74504bd55"), 31_271_525),
            ],
            Settings::default(),
        )
    }

    /// Config for `chain`; chains without an entry get no factories and floor block 1.
    pub fn get(&self, chain: Chain) -> ChainConfig {
        self.chains
            .get(&chain)
            .cloned()
            .unwrap_or_else(|| ChainConfig::empty(chain))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn chains(&self) -> Vec<Chain> {
        let mut chains: Vec<Chain> = self.chains.keys().copied().collect();
        chains.sort();
        chains
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Parse the contents of a chains.json file.
/// Expects format: { "chains": { "<chain>": { factories, deployedBlock } }, "settings": { ... } }.
/// A missing `deployedBlock` falls back to block 1.
pub fn parse_chains_file(content: &str) -> Result<ChainRegistry, ConfigError> {
    let file: ChainsFile = serde_json::from_str(content)?;
    let configs = file.chains.into_iter().map(|(chain, entry)| ChainConfig {
        chain,
        factory_addresses: entry.factories,
        deployed_from_block: entry.deployed_block.unwrap_or(1),
    });
    Ok(ChainRegistry::new(configs, file.settings))
}

pub fn load_chains_file(path: &Path) -> Result<ChainRegistry, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_chains_file(&content)
}

/// Load the registry from `CHAINS_JSON` (default `chains.json`, relative to the current directory).
/// An explicitly configured path must exist; a missing default file means the built-in table.
pub fn load_registry() -> Result<ChainRegistry, ConfigError> {
    match std::env::var("CHAINS_JSON") {
        Ok(path) => load_chains_file(Path::new(&path)),
        Err(_) => {
            let path = Path::new("chains.json");
            if path.exists() {
                load_chains_file(path)
            } else {
                info!("chains.json not found; using built-in chain registry");
                Ok(ChainRegistry::builtin())
            }
        }
    }
}

/// Resolve the RPC endpoint for `chain` through `lookup` (normally the process environment).
pub fn rpc_url_with(
    chain: Chain,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<alloy::transports::http::reqwest::Url, ConfigError> {
    let env_key = chain.rpc_env_key();
    let url = lookup(env_key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingRpc { chain, env_key })?;
    url.parse().map_err(|_| ConfigError::InvalidRpcUrl { chain, env_key, url })
}

pub fn rpc_url(chain: Chain) -> Result<alloy::transports::http::reqwest::Url, ConfigError> {
    rpc_url_with(chain, |key| std::env::var(key).ok())
}
