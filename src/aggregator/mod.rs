use crate::error::AggregationError;
use crate::rpc::{BatchCaller, Call};
use crate::types::{BalanceCall, BalanceObservation, Pool};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use tracing::{debug, info};

sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256 balance);
    }
}

/// Sink for discovered balances.
pub trait Accumulator {
    fn add(&mut self, token: Address, amount: U256);
}

/// Token → summed balance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balances {
    tokens: BTreeMap<Address, U256>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token: &Address) -> Option<U256> {
        self.tokens.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &U256)> {
        self.tokens.iter()
    }
}

impl Accumulator for Balances {
    fn add(&mut self, token: Address, amount: U256) {
        let total = self.tokens.entry(token).or_insert(U256::ZERO);
        *total = total.saturating_add(amount);
    }
}

/// Serialised as `{ "<checksummed token>": "<decimal amount>" }`.
impl Serialize for Balances {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (token, amount) in self.iter() {
            map.serialize_entry(&token.to_checksum(None), &amount.to_string())?;
        }
        map.end()
    }
}

/// One `balanceOf(strategy)` read on each pool's token, in pool order.
pub fn balance_calls(pools: &[Pool]) -> Vec<BalanceCall> {
    pools
        .iter()
        .map(|pool| BalanceCall { token: pool.token, holder: pool.strategy })
        .collect()
}

/// Turn positionally aligned batch results into observations, dropping failed and zero reads.
pub fn observations(
    calls: &[BalanceCall],
    results: Vec<Option<Bytes>>,
) -> Result<Vec<BalanceObservation>, AggregationError> {
    if results.len() != calls.len() {
        return Err(AggregationError::LengthMismatch { expected: calls.len(), found: results.len() });
    }

    let observations = calls
        .iter()
        .zip(results)
        .filter_map(|(call, result)| {
            let amount = result.and_then(|data| {
                IERC20::balanceOfCall::abi_decode_returns(&data, true)
                    .map(|ret| ret.balance)
                    .ok()
            });
            match amount {
                Some(amount) if !amount.is_zero() => Some(BalanceObservation { token: call.token, amount }),
                _ => {
                    debug!(token = %call.token, holder = %call.holder, "No balance read");
                    None
                }
            }
        })
        .collect();
    Ok(observations)
}

/// Read every pool's token balance in one batch and push the positive ones into `accumulator`.
/// Returns the number of observations emitted.
pub async fn aggregate_balances<B, A>(
    pools: &[Pool],
    batch: &B,
    accumulator: &mut A,
) -> Result<usize, AggregationError>
where
    B: BatchCaller + ?Sized,
    A: Accumulator + ?Sized,
{
    if pools.is_empty() {
        return Ok(0);
    }

    let calls = balance_calls(pools);
    let encoded: Vec<Call> = calls
        .iter()
        .map(|call| Call {
            target: call.token,
            call_data: IERC20::balanceOfCall { account: call.holder }.abi_encode().into(),
        })
        .collect();

    let results = batch.multi_call(&encoded).await?;
    let observations = observations(&calls, results)?;
    for observation in &observations {
        accumulator.add(observation.token, observation.amount);
    }

    info!(pools = pools.len(), balances = observations.len(), "Aggregated balances");
    Ok(observations.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BatchCallError;
    use crate::testing::FakeBatch;
    use crate::types::{PoolCreatedEvent, PoolMetadata};
    use alloy::primitives::address;

    /// Records every `add` in call order.
    #[derive(Default)]
    struct Recorder(Vec<(Address, U256)>);

    impl Accumulator for Recorder {
        fn add(&mut self, token: Address, amount: U256) {
            self.0.push((token, amount));
        }
    }

    fn pool(strategy: Address, token: Address) -> Pool {
        PoolCreatedEvent {
            pool_id: "1".to_string(),
            strategy,
            community: Address::ZERO,
            token,
            metadata: PoolMetadata { protocol: "1".to_string(), pointer: String::new() },
        }
    }

    fn encoded_balance(amount: u64) -> Option<Bytes> {
        Some(U256::from(amount).to_be_bytes::<32>().to_vec().into())
    }

    fn three_pools() -> Vec<Pool> {
        vec![
            pool(address!("a000000000000000000000000000000000000001"), address!("b000000000000000000000000000000000000001")),
            pool(address!("a000000000000000000000000000000000000002"), address!("b000000000000000000000000000000000000002")),
            pool(address!("a000000000000000000000000000000000000003"), address!("b000000000000000000000000000000000000003")),
        ]
    }

    #[tokio::test]
    async fn test_zero_and_null_balances_are_skipped() {
        let pools = three_pools();
        let batch = FakeBatch::returning(vec![encoded_balance(500), encoded_balance(0), None]);
        let mut recorder = Recorder::default();

        let emitted = aggregate_balances(&pools, &batch, &mut recorder).await.unwrap();

        assert_eq!(emitted, 1);
        assert_eq!(recorder.0, vec![(pools[0].token, U256::from(500))]);
    }

    #[tokio::test]
    async fn test_calls_target_token_with_strategy_as_holder() {
        let pools = three_pools();
        let batch = FakeBatch::returning(vec![None, None, None]);
        let mut balances = Balances::new();

        aggregate_balances(&pools, &batch, &mut balances).await.unwrap();

        let calls = batch.calls();
        assert_eq!(calls.len(), 3);
        for (call, pool) in calls.iter().zip(&pools) {
            assert_eq!(call.target, pool.token);
            let decoded = IERC20::balanceOfCall::abi_decode(&call.call_data, true).unwrap();
            assert_eq!(decoded.account, pool.strategy);
        }
        assert!(balances.is_empty());
    }

    #[tokio::test]
    async fn test_batch_failure_is_fatal() {
        let batch = FakeBatch::failing("connection reset");
        let mut balances = Balances::new();

        let err = aggregate_balances(&three_pools(), &batch, &mut balances).await.unwrap_err();
        assert!(matches!(err, AggregationError::Batch(BatchCallError(_))));
    }

    #[tokio::test]
    async fn test_no_pools_skips_batch() {
        let batch = FakeBatch::failing("should not be called");
        let mut balances = Balances::new();

        assert_eq!(aggregate_balances(&[], &batch, &mut balances).await.unwrap(), 0);
        assert!(batch.calls().is_empty());
    }

    #[test]
    fn test_misaligned_results_are_rejected() {
        let calls = balance_calls(&three_pools());
        let err = observations(&calls, vec![encoded_balance(1)]).unwrap_err();
        assert!(matches!(err, AggregationError::LengthMismatch { expected: 3, found: 1 }));
    }

    #[test]
    fn test_undecodable_result_counts_as_failed_read() {
        let calls = balance_calls(&three_pools());
        let results = vec![Some(Bytes::from_static(&[1, 2, 3])), encoded_balance(7), None];
        let obs = observations(&calls, results).unwrap();
        assert_eq!(obs, vec![BalanceObservation { token: calls[1].token, amount: U256::from(7) }]);
    }

    #[test]
    fn test_balances_sum_per_token_and_serialize() {
        let token = address!("b000000000000000000000000000000000000001");
        let mut balances = Balances::new();
        balances.add(token, U256::from(5));
        balances.add(token, U256::from(10));

        assert_eq!(balances.get(&token), Some(U256::from(15)));
        let json = serde_json::to_value(&balances).unwrap();
        assert_eq!(json[token.to_checksum(None)], "15");
    }
}
