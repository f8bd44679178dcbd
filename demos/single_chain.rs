use dotenvy::dotenv;
use gardens_tvl::aggregator::aggregate_balances;
use gardens_tvl::config::{self, ChainRegistry};
use gardens_tvl::discovery::EntityDiscovery;
use gardens_tvl::rpc::RpcClient;
use gardens_tvl::{Balances, Chain};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Lists the communities and pools of one chain, then prints its TVL.
/// Usage: `cargo run --example single_chain -- arbitrum` (reads `ARBITRUM_RPC`).
#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(Level::INFO).finish(),
    )?;

    let chain: Chain = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "xdai".to_string())
        .parse()?;
    let registry = ChainRegistry::builtin();
    let chain_config = registry.get(chain);

    let client = RpcClient::new(config::rpc_url(chain)?, registry.settings());
    let discovery = EntityDiscovery::new(&client, registry.settings());

    let communities = discovery.discover_communities(&chain_config).await?;
    for community in &communities {
        info!("Community: {}", community.to_checksum(None));
    }

    let pools = discovery.discover_pools(&chain_config, &communities).await?;
    for pool in &pools {
        info!(
            "Pool #{}: strategy {} token {} ({})",
            pool.pool_id,
            pool.strategy.to_checksum(None),
            pool.token.to_checksum(None),
            pool.metadata.pointer
        );
    }

    let mut balances = Balances::new();
    aggregate_balances(&pools, &client, &mut balances).await?;
    println!("{}", serde_json::to_string_pretty(&balances)?);

    Ok(())
}
