use alloy::primitives::{keccak256, B256, U256};

use crate::chain::ChainGateway;
use crate::error::RecoveryResult;

/// Storage slot of the oracle's `requestId => commitment` mapping
pub const COMMITMENTS_MAPPING_SLOT: u64 = 2;

/// Solidity mapping key: `keccak256(requestId ‖ pad32(slot))`
pub fn commitment_storage_key(request_id: &B256) -> B256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(request_id.as_slice());
    preimage[32..].copy_from_slice(&U256::from(COMMITMENTS_MAPPING_SLOT).to_be_bytes::<32>());
    keccak256(preimage)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillmentStatus {
    /// Commitment still stored; the request awaits an answer
    Pending,
    /// Commitment deleted by fulfillment or cancellation
    Fulfilled,
}

impl FulfillmentStatus {
    pub fn from_commitment(word: B256) -> Self {
        if word == B256::ZERO {
            FulfillmentStatus::Fulfilled
        } else {
            FulfillmentStatus::Pending
        }
    }

    pub fn is_pending(self) -> bool {
        self == FulfillmentStatus::Pending
    }
}

/// Read the on-chain commitment of `request_id` at the latest block
pub async fn fulfillment_status(gateway: &dyn ChainGateway, request_id: &B256) -> RecoveryResult<FulfillmentStatus> {
    let word = gateway.storage_at(commitment_storage_key(request_id)).await?;
    Ok(FulfillmentStatus::from_commitment(word))
}
