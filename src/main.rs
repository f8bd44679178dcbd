use dotenvy::dotenv;
use gardens_tvl::adapter::{self, TvlReport};
use gardens_tvl::config;
use gardens_tvl::Chain;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    // Initialize logging
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|l| l.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let registry = Arc::new(config::load_registry()?);
    let metadata = adapter::metadata(&registry);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--metadata") {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    let chains: Vec<Chain> = if args.is_empty() {
        registry.chains()
    } else {
        args.iter().map(|a| a.parse()).collect::<Result<_, _>>()?
    };

    info!("Computing TVL for {} chain(s)...", chains.len());

    // Chains are independent: one failing does not stop the others.
    let handles: Vec<_> = chains
        .into_iter()
        .map(|chain| {
            let registry = Arc::clone(&registry);
            (chain, tokio::spawn(async move { adapter::run_chain(&registry, chain).await }))
        })
        .collect();

    let mut report = TvlReport::new();
    for (chain, handle) in handles {
        let outcome = adapter::chain_outcome(chain, handle.await);
        if let Err(e) = &outcome {
            error!("TVL run failed: {}", e);
        }
        report.record(chain, outcome);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
