use crate::error::{BatchCallError, LogsError, LogsErrorKind};
use crate::types::{BlockTarget, LogQuery, RawLog, Settings};
use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::eth::Filter;
use alloy::sol;
use alloy::transports::http::reqwest::Url;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Source of contract event logs (`eth_getLogs`).
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetch every log emitted by `query.address` with `query.topic0` in the query's block range.
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, LogsError>;

    /// Current chain head, used to split open-ended queries.
    async fn latest_block(&self) -> Result<u64, LogsError>;
}

/// A single read-only call: `target` receives `call_data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub target: Address,
    pub call_data: Bytes,
}

/// Batched contract reads. Results are aligned with `calls`; a failed call yields `None`.
#[async_trait]
pub trait BatchCaller: Send + Sync {
    async fn multi_call(&self, calls: &[Call]) -> Result<Vec<Option<Bytes>>, BatchCallError>;
}

sol! {
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Call3Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Call3Result[] memory returnData);
    }
}

/// Map a provider error message onto the rejection kinds the range fetcher reacts to.
/// Providers do not agree on error codes for these limits, so the message text is matched.
pub fn classify_rpc_error(message: &str) -> LogsErrorKind {
    let msg = message.to_ascii_lowercase();
    let any = |needles: &[&str]| needles.iter().any(|n| msg.contains(n));

    if any(&["429", "rate limit", "too many requests", "exceeded the rate", "throttl", "capacity"]) {
        LogsErrorKind::RateLimited
    } else if any(&["timeout", "timed out", "deadline"]) {
        LogsErrorKind::Timeout
    } else if any(&[
        "query returned more than",
        "too many results",
        "result set",
        "response size",
        "logs matched",
        "limit exceeded",
        "response is too big",
    ]) {
        LogsErrorKind::ResultSetTooLarge
    } else if any(&[
        "block range",
        "range too large",
        "range is too large",
        "exceed maximum block",
        "blocks range",
        "range limit",
        "max range",
    ]) {
        LogsErrorKind::RangeTooLarge
    } else {
        LogsErrorKind::Other
    }
}

/// HTTP JSON-RPC client for one chain.
#[derive(Clone)]
pub struct RpcClient {
    provider: Arc<RootProvider<Http<Client>>>,
    multicall_address: Address,
    batch_size: usize,
}

impl RpcClient {
    pub fn new(url: Url, settings: &Settings) -> Self {
        let provider = ProviderBuilder::new().on_http(url);
        Self {
            provider: Arc::new(provider),
            multicall_address: settings.multicall_address,
            batch_size: settings.multicall_batch_size.max(1),
        }
    }

    fn logs_error(err: impl std::fmt::Display) -> LogsError {
        let message = err.to_string();
        LogsError::new(classify_rpc_error(&message), message)
    }
}

#[async_trait]
impl LogSource for RpcClient {
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, LogsError> {
        let to_block = match query.to_block {
            BlockTarget::Number(n) => BlockNumberOrTag::Number(n),
            BlockTarget::Latest => BlockNumberOrTag::Latest,
        };
        let filter = Filter::new()
            .address(query.address)
            .event_signature(query.topic0)
            .from_block(query.from_block)
            .to_block(to_block);

        let logs = self.provider.get_logs(&filter).await.map_err(Self::logs_error)?;
        Ok(logs.into_iter().map(RawLog::from).collect())
    }

    async fn latest_block(&self) -> Result<u64, LogsError> {
        self.provider.get_block_number().await.map_err(Self::logs_error)
    }
}

#[async_trait]
impl BatchCaller for RpcClient {
    async fn multi_call(&self, calls: &[Call]) -> Result<Vec<Option<Bytes>>, BatchCallError> {
        let multicall = IMulticall3::new(self.multicall_address, self.provider.clone());
        let mut results = Vec::with_capacity(calls.len());

        for chunk in calls.chunks(self.batch_size) {
            let batch: Vec<IMulticall3::Call3> = chunk
                .iter()
                .map(|call| IMulticall3::Call3 {
                    target: call.target,
                    allowFailure: true,
                    callData: call.call_data.clone(),
                })
                .collect();

            debug!(calls = batch.len(), "Sending aggregate3 batch");
            let response = multicall
                .aggregate3(batch)
                .call()
                .await
                .map_err(|e| BatchCallError(e.to_string()))?;

            results.extend(
                response
                    .returnData
                    .into_iter()
                    .map(|r| r.success.then_some(r.returnData)),
            );
        }

        Ok(results)
    }
}
