pub mod adapter;
pub mod aggregator;
pub mod config;
pub mod decoder;
pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod rpc;
pub mod types;

#[cfg(test)]
mod testing;

pub use adapter::{compute_tvl, run_chain};
pub use aggregator::{Accumulator, Balances};
pub use config::ChainRegistry;
pub use error::TvlError;
pub use types::{Chain, ChainConfig, Pool};
