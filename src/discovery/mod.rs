use crate::decoder::{
    decode_community_created, decode_pool_created, COMMUNITY_CREATED_TOPIC, POOL_CREATED_TOPIC,
};
use crate::error::{DecodeError, DiscoveryError};
use crate::fetcher::RangeFetcher;
use crate::rpc::LogSource;
use crate::types::{BlockTarget, ChainConfig, DecodePolicy, Pool, RawLog, Settings};
use alloy::primitives::{Address, B256};
use futures::future::try_join_all;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Walks factories for communities, then communities for pools.
pub struct EntityDiscovery<'a, S: ?Sized> {
    fetcher: RangeFetcher<'a, S>,
    decode_policy: DecodePolicy,
}

impl<'a, S: LogSource + ?Sized> EntityDiscovery<'a, S> {
    pub fn new(source: &'a S, settings: &Settings) -> Self {
        Self {
            fetcher: RangeFetcher::new(source, settings),
            decode_policy: settings.decode_policy,
        }
    }

    /// Unique community addresses created by any of the chain's factories, in first-seen order.
    pub async fn discover_communities(&self, config: &ChainConfig) -> Result<Vec<Address>, DiscoveryError> {
        if config.factory_addresses.is_empty() {
            info!(chain = %config.chain, "No factories configured");
            return Ok(vec![]);
        }

        let logs = self
            .fetch_all(&config.factory_addresses, COMMUNITY_CREATED_TOPIC, config.deployed_from_block)
            .await?;

        let mut seen = HashSet::new();
        let mut communities = Vec::new();
        for log in &logs {
            let Some(event) = self.decode(log, decode_community_created)? else {
                continue;
            };
            if seen.insert(event.registry_community) {
                communities.push(event.registry_community);
            }
        }

        info!(
            chain = %config.chain,
            logs = logs.len(),
            communities = communities.len(),
            "Discovered communities"
        );
        Ok(communities)
    }

    /// Pools created by `communities`, one per `(strategy, token)`; the last processed log wins.
    pub async fn discover_pools(
        &self,
        config: &ChainConfig,
        communities: &[Address],
    ) -> Result<Vec<Pool>, DiscoveryError> {
        if communities.is_empty() {
            return Ok(vec![]);
        }

        let logs = self
            .fetch_all(communities, POOL_CREATED_TOPIC, config.deployed_from_block)
            .await?;

        let mut pools: BTreeMap<(Address, Address), Pool> = BTreeMap::new();
        for log in &logs {
            if let Some(pool) = self.decode(log, decode_pool_created)? {
                pools.insert(pool.key(), pool);
            }
        }

        info!(chain = %config.chain, logs = logs.len(), pools = pools.len(), "Discovered pools");
        Ok(pools.into_values().collect())
    }

    /// Fetch `topic0` logs from every address concurrently, then merge in address order.
    async fn fetch_all(
        &self,
        addresses: &[Address],
        topic0: B256,
        from_block: u64,
    ) -> Result<Vec<RawLog>, DiscoveryError> {
        let batches = try_join_all(
            addresses
                .iter()
                .map(|&address| self.fetcher.fetch(address, topic0, from_block, BlockTarget::Latest)),
        )
        .await?;
        Ok(batches.into_iter().flatten().collect())
    }

    fn decode<T>(
        &self,
        log: &RawLog,
        decode: impl Fn(&RawLog) -> Result<T, DecodeError>,
    ) -> Result<Option<T>, DiscoveryError> {
        match decode(log) {
            Ok(event) => Ok(Some(event)),
            Err(source) => match self.decode_policy {
                DecodePolicy::Strict => Err(DiscoveryError::Decode {
                    address: log.address,
                    block: display_opt(log.block_number),
                    log_index: display_opt(log.log_index),
                    source,
                }),
                DecodePolicy::Skip => {
                    warn!(
                        address = %log.address,
                        block = ?log.block_number,
                        error = %source,
                        "Skipping undecodable log"
                    );
                    Ok(None)
                }
            },
        }
    }
}

fn display_opt(value: Option<u64>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}
