use crate::error::{LogsError, LogsErrorKind, RetrievalError};
use crate::rpc::LogSource;
use crate::types::{BlockTarget, LogQuery, RawLog, Settings};
use alloy::primitives::{Address, B256};
use futures::future::BoxFuture;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Retrieves every log for an address and topic over a block range, halving the range
/// whenever the provider rejects a request for being too large, too slow or too frequent.
///
/// Sibling halves run concurrently. `max_concurrent_requests` bounds the in-flight requests of
/// every fetch issued through one fetcher, so a discovery pass shares a single limit across all
/// the addresses it queries. If either half fails for good the other is dropped.
pub struct RangeFetcher<'a, S: ?Sized> {
    source: &'a S,
    permits: Semaphore,
    rate_limit_backoff: Duration,
}

impl<'a, S: LogSource + ?Sized> RangeFetcher<'a, S> {
    pub fn new(source: &'a S, settings: &Settings) -> Self {
        Self {
            source,
            permits: Semaphore::new(settings.max_concurrent_requests.max(1)),
            rate_limit_backoff: Duration::from_millis(settings.rate_limit_backoff_ms),
        }
    }

    /// Fetch all logs for `address`/`topic0` in `[from_block, to_block]`.
    ///
    /// The returned logs are not ordered across sub-ranges.
    pub async fn fetch(
        &self,
        address: Address,
        topic0: B256,
        from_block: u64,
        to_block: BlockTarget,
    ) -> Result<Vec<RawLog>, RetrievalError> {
        match to_block {
            BlockTarget::Number(to_block) => {
                if from_block > to_block {
                    return Err(RetrievalError::InvalidRange { address, from_block, to_block });
                }
                self.fetch_bounded(address, topic0, from_block, to_block).await
            }
            BlockTarget::Latest => {
                let query = LogQuery::new(address, topic0, from_block, BlockTarget::Latest);
                let err = match self.request(&query).await {
                    Ok(logs) => return Ok(logs),
                    Err(err) if err.kind.is_splittable() => err,
                    Err(source) => {
                        return Err(RetrievalError::Provider {
                            address,
                            from_block,
                            to_block: BlockTarget::Latest,
                            source,
                        });
                    }
                };

                let head = self
                    .source
                    .latest_block()
                    .await
                    .map_err(|source| RetrievalError::Head { address, source })?;
                if head < from_block {
                    return Err(RetrievalError::InvalidRange { address, from_block, to_block: head });
                }
                self.split(address, topic0, from_block, head, err).await
            }
        }
    }

    fn fetch_bounded(
        &self,
        address: Address,
        topic0: B256,
        from_block: u64,
        to_block: u64,
    ) -> BoxFuture<'_, Result<Vec<RawLog>, RetrievalError>> {
        Box::pin(async move {
            let query = LogQuery::new(address, topic0, from_block, to_block);
            match self.request(&query).await {
                Ok(logs) => Ok(logs),
                Err(err) if err.kind.is_splittable() => {
                    self.split(address, topic0, from_block, to_block, err).await
                }
                Err(source) => Err(RetrievalError::Provider {
                    address,
                    from_block,
                    to_block: BlockTarget::Number(to_block),
                    source,
                }),
            }
        })
    }

    async fn split(
        &self,
        address: Address,
        topic0: B256,
        from_block: u64,
        to_block: u64,
        cause: LogsError,
    ) -> Result<Vec<RawLog>, RetrievalError> {
        if from_block >= to_block {
            return Err(RetrievalError::Exhausted { address, block: from_block, source: cause });
        }

        if cause.kind == LogsErrorKind::RateLimited && !self.rate_limit_backoff.is_zero() {
            warn!(%address, from_block, to_block, "Rate limited; backing off before splitting");
            tokio::time::sleep(self.rate_limit_backoff).await;
        }

        let mid = from_block + (to_block - from_block) / 2;
        debug!(%address, from_block, mid, to_block, reason = %cause.kind, "Splitting log range");

        let (mut left, right) = futures::try_join!(
            self.fetch_bounded(address, topic0, from_block, mid),
            self.fetch_bounded(address, topic0, mid + 1, to_block),
        )?;
        left.extend(right);
        Ok(left)
    }

    async fn request(&self, query: &LogQuery) -> Result<Vec<RawLog>, LogsError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LogsError::new(LogsErrorKind::Other, "request limiter closed"))?;
        self.source.get_logs(query).await
    }
}
