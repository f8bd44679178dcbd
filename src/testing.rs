//! In-memory providers for unit tests.

use crate::error::{BatchCallError, LogsError, LogsErrorKind};
use crate::rpc::{BatchCaller, Call, LogSource};
use crate::types::{BlockTarget, LogQuery, RawLog};
use alloy::primitives::{Address, Bytes, LogData, B256};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

pub fn log_at(address: Address, topic0: B256, block: u64) -> RawLog {
    RawLog {
        address,
        topics: vec![topic0],
        data: Bytes::new(),
        block_number: Some(block),
        log_index: Some(0),
    }
}

pub fn encoded_log(address: Address, block: u64, log_index: u64, data: LogData) -> RawLog {
    RawLog {
        address,
        topics: data.topics().to_vec(),
        data: data.data.clone(),
        block_number: Some(block),
        log_index: Some(log_index),
    }
}

/// A chain whose `eth_getLogs` enforces configurable limits.
pub struct FakeChain {
    head: u64,
    logs: Vec<RawLog>,
    max_range: Option<u64>,
    max_results: Option<usize>,
    rate_limit_above: Option<u64>,
    failing_block: Option<(u64, LogsErrorKind)>,
    requests: Mutex<Vec<(u64, u64)>>,
}

impl FakeChain {
    pub fn new(head: u64) -> Self {
        Self {
            head,
            logs: vec![],
            max_range: None,
            max_results: None,
            rate_limit_above: None,
            failing_block: None,
            requests: Mutex::new(vec![]),
        }
    }

    pub fn with_logs(mut self, logs: impl IntoIterator<Item = RawLog>) -> Self {
        self.logs.extend(logs);
        self
    }

    pub fn with_max_range(mut self, blocks: u64) -> Self {
        self.max_range = Some(blocks);
        self
    }

    pub fn with_max_results(mut self, results: usize) -> Self {
        self.max_results = Some(results);
        self
    }

    pub fn with_rate_limit_above(mut self, blocks: u64) -> Self {
        self.rate_limit_above = Some(blocks);
        self
    }

    /// Every request whose range covers `block` fails with `kind`.
    pub fn with_failing_block(mut self, block: u64, kind: LogsErrorKind) -> Self {
        self.failing_block = Some((block, kind));
        self
    }

    /// Ranges requested so far, with `latest` resolved to the head.
    pub fn requests(&self) -> HashSet<(u64, u64)> {
        self.requests.lock().unwrap().iter().copied().collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// What a provider without limits would return.
    pub fn get_logs_unlimited(&self, address: Address, topic0: B256, from: u64, to: u64) -> Vec<RawLog> {
        self.logs
            .iter()
            .filter(|log| log.address == address && log.topics.first() == Some(&topic0))
            .filter(|log| log.block_number.is_some_and(|b| b >= from && b <= to))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LogSource for FakeChain {
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, LogsError> {
        let to = match query.to_block {
            BlockTarget::Number(n) => n,
            BlockTarget::Latest => self.head,
        };
        let from = query.from_block;
        self.requests.lock().unwrap().push((from, to));

        let span = to - from + 1;
        if let Some((block, kind)) = self.failing_block {
            if block >= from && block <= to {
                return Err(LogsError::new(kind, format!("block {block} unavailable")));
            }
        }
        if self.rate_limit_above.is_some_and(|limit| span > limit) {
            return Err(LogsError::new(LogsErrorKind::RateLimited, "429 Too Many Requests"));
        }
        if self.max_range.is_some_and(|limit| span > limit) {
            return Err(LogsError::new(LogsErrorKind::RangeTooLarge, "block range too large"));
        }

        let logs = self.get_logs_unlimited(query.address, query.topic0, from, to);
        if self.max_results.is_some_and(|limit| logs.len() > limit) {
            return Err(LogsError::new(
                LogsErrorKind::ResultSetTooLarge,
                format!("query returned more than {} results", logs.len()),
            ));
        }
        Ok(logs)
    }

    async fn latest_block(&self) -> Result<u64, LogsError> {
        Ok(self.head)
    }
}

/// Batch caller answering from a fixed result list.
pub struct FakeBatch {
    results: Result<Vec<Option<Bytes>>, BatchCallError>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBatch {
    pub fn returning(results: Vec<Option<Bytes>>) -> Self {
        Self { results: Ok(results), calls: Mutex::new(vec![]) }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            results: Err(BatchCallError(message.to_string())),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchCaller for FakeBatch {
    async fn multi_call(&self, calls: &[Call]) -> Result<Vec<Option<Bytes>>, BatchCallError> {
        self.calls.lock().unwrap().extend_from_slice(calls);
        self.results.clone()
    }
}
