use crate::aggregator::{aggregate_balances, Accumulator, Balances};
use crate::config::{self, ChainRegistry};
use crate::discovery::EntityDiscovery;
use crate::error::{Phase, TvlError};
use crate::rpc::{BatchCaller, LogSource, RpcClient};
use crate::types::{Chain, ChainConfig, Settings};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

pub const METHODOLOGY: &str = "Reads CommunityCreated events from the Gardens registry factories and PoolCreated events from each community, then sums the ERC20 balances held by every pool strategy.";

/// Unix timestamp of the earliest valid data (2022-01-01).
pub const START: u64 = 1_640_995_200;

#[derive(Debug, Clone, Serialize)]
pub struct AdapterMetadata {
    pub methodology: &'static str,
    pub start: u64,
    pub chains: Vec<Chain>,
}

pub fn metadata(registry: &ChainRegistry) -> AdapterMetadata {
    AdapterMetadata {
        methodology: METHODOLOGY,
        start: START,
        chains: registry.chains(),
    }
}

/// Outcome of one chain run as it appears in the report.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ChainReport {
    Tokens { tokens: Balances },
    Failed { error: String },
}

/// `{ "methodology", "start", "chains": { "<chain>": { "tokens" } | { "error" } } }`
#[derive(Debug, Serialize)]
pub struct TvlReport {
    pub methodology: &'static str,
    pub start: u64,
    pub chains: BTreeMap<Chain, ChainReport>,
}

impl TvlReport {
    pub fn new() -> Self {
        Self {
            methodology: METHODOLOGY,
            start: START,
            chains: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, chain: Chain, outcome: Result<Balances, String>) {
        let report = match outcome {
            Ok(tokens) => ChainReport::Tokens { tokens },
            Err(error) => ChainReport::Failed { error },
        };
        self.chains.insert(chain, report);
    }
}

impl Default for TvlReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten a spawned chain run. A task that panicked or was cancelled fails only its own chain.
pub fn chain_outcome(
    chain: Chain,
    joined: Result<Result<Balances, TvlError>, tokio::task::JoinError>,
) -> Result<Balances, String> {
    match joined {
        Ok(outcome) => outcome.map_err(|e| e.to_string()),
        Err(e) => Err(format!("{chain} run aborted: {e}")),
    }
}

/// Discover every pool on `config.chain` and push its positive token balances into `accumulator`.
pub async fn compute_tvl<S, B, A>(
    config: &ChainConfig,
    settings: &Settings,
    logs: &S,
    batch: &B,
    accumulator: &mut A,
) -> Result<(), TvlError>
where
    S: LogSource + ?Sized,
    B: BatchCaller + ?Sized,
    A: Accumulator + ?Sized,
{
    let chain = config.chain;
    let discovery = EntityDiscovery::new(logs, settings);

    let communities = discovery
        .discover_communities(config)
        .await
        .map_err(|source| TvlError::Discovery { chain, phase: Phase::CommunityDiscovery, source })?;
    if communities.is_empty() {
        info!(%chain, "No communities; nothing to aggregate");
        return Ok(());
    }

    let pools = discovery
        .discover_pools(config, &communities)
        .await
        .map_err(|source| TvlError::Discovery { chain, phase: Phase::PoolDiscovery, source })?;

    aggregate_balances(&pools, batch, accumulator)
        .await
        .map_err(|source| TvlError::Aggregation { chain, source })?;
    Ok(())
}

/// Run one chain against its RPC endpoint from the environment.
pub async fn run_chain(registry: &ChainRegistry, chain: Chain) -> Result<Balances, TvlError> {
    let url = config::rpc_url(chain).map_err(|source| TvlError::Configuration { chain, source })?;
    let client = RpcClient::new(url, registry.settings());

    let mut balances = Balances::new();
    compute_tvl(&registry.get(chain), registry.settings(), &client, &client, &mut balances).await?;
    info!(%chain, tokens = balances.len(), "Chain run complete");
    Ok(balances)
}
