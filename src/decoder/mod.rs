use crate::error::DecodeError;
use crate::types::{CommunityCreatedEvent, PoolCreatedEvent, PoolMetadata, RawLog};
use alloy::primitives::B256;
use alloy::sol;
use alloy::sol_types::SolEvent;

sol! {
    event CommunityCreated(address _registryCommunity);

    struct Metadata {
        uint256 protocol;
        string pointer;
    }

    event PoolCreated(
        uint256 _poolId,
        address _strategy,
        address _community,
        address _token,
        Metadata _metadata
    );
}

/// keccak256("CommunityCreated(address)")
pub const COMMUNITY_CREATED_TOPIC: B256 = CommunityCreated::SIGNATURE_HASH;
/// keccak256("PoolCreated(uint256,address,address,address,(uint256,string))")
pub const POOL_CREATED_TOPIC: B256 = PoolCreated::SIGNATURE_HASH;

/// Decode `log` as event `E` with strict ABI validation (zero-padded addresses, in-bounds offsets).
fn decode_event<E: SolEvent>(log: &RawLog, event: &'static str) -> Result<E, DecodeError> {
    // Neither event has indexed fields: topic0 only.
    let expected = 1;
    if log.topics.len() != expected {
        return Err(DecodeError::TopicCount { event, expected, found: log.topics.len() });
    }
    if log.topics[0] != E::SIGNATURE_HASH {
        return Err(DecodeError::Signature {
            event,
            expected: E::SIGNATURE_HASH,
            found: log.topics[0],
        });
    }
    E::decode_raw_log(log.topics.iter().copied(), &log.data, true)
        .map_err(|source| DecodeError::Abi { event, source })
}

pub fn decode_community_created(log: &RawLog) -> Result<CommunityCreatedEvent, DecodeError> {
    let event: CommunityCreated = decode_event(log, "CommunityCreated")?;
    Ok(CommunityCreatedEvent {
        registry_community: event._registryCommunity,
    })
}

pub fn decode_pool_created(log: &RawLog) -> Result<PoolCreatedEvent, DecodeError> {
    let event: PoolCreated = decode_event(log, "PoolCreated")?;
    Ok(PoolCreatedEvent {
        pool_id: event._poolId.to_string(),
        strategy: event._strategy,
        community: event._community,
        token: event._token,
        metadata: PoolMetadata {
            protocol: event._metadata.protocol.to_string(),
            pointer: event._metadata.pointer,
        },
    })
}
