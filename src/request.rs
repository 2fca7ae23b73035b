use alloy::primitives::{b256, Address, Bytes, FixedBytes, LogData, B256, U256};
use alloy::sol_types::{SolCall, SolEvent};
use serde::{Deserialize, Serialize};

use crate::chain::{abi, RawLog};
use crate::error::{RecoveryError, RecoveryResult};

/// Response value delivered to every recovered request
pub const PLACEHOLDER_RESPONSE: B256 =
    b256!("000000000000000000000000000000000000000000000000000000c2797eab80");

/// A decoded request-creation event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRequest {
    pub request_id: B256,
    pub payment: U256,
    pub callback_address: Address,
    pub callback_function_id: FixedBytes<4>,
    pub cancel_expiration: U256,
    pub job_id: B256,
    pub block_number: u64,
    pub transaction_hash: B256,
}

impl OracleRequest {
    pub fn decode(log: &RawLog) -> RecoveryResult<Self> {
        let block_number = log
            .block_number
            .ok_or_else(|| RecoveryError::Decode("log without block number".to_string()))?;
        let transaction_hash = log
            .transaction_hash
            .ok_or_else(|| RecoveryError::Decode("log without transaction hash".to_string()))?;

        let data = LogData::new(log.topics.clone(), log.data.clone())
            .ok_or_else(|| RecoveryError::Decode(format!("too many topics in log at block {}", block_number)))?;
        let event = abi::OracleRequest::decode_log_data(&data, true).map_err(|e| {
            RecoveryError::Decode(format!("OracleRequest at block {} ({}): {}", block_number, transaction_hash, e))
        })?;

        Ok(Self {
            request_id: event.requestId,
            payment: event.payment,
            callback_address: event.callbackAddr,
            callback_function_id: event.callbackFunctionId,
            cancel_expiration: event.cancelExpiration,
            job_id: event.specId,
            block_number,
            transaction_hash,
        })
    }

    /// Arguments of the fulfillment call answering this request
    pub fn fulfillment_args(&self) -> FulfillmentArgs {
        FulfillmentArgs {
            request_id: self.request_id,
            payment: self.payment,
            callback_address: self.callback_address,
            callback_function_id: self.callback_function_id,
            expiration: self.cancel_expiration,
            data: PLACEHOLDER_RESPONSE,
        }
    }
}

/// Arguments of `fulfillOracleRequest`, in named form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentArgs {
    pub request_id: B256,
    pub payment: U256,
    pub callback_address: Address,
    pub callback_function_id: FixedBytes<4>,
    pub expiration: U256,
    pub data: B256,
}

impl FulfillmentArgs {
    pub fn calldata(&self) -> Bytes {
        abi::fulfillOracleRequestCall {
            _requestId: self.request_id,
            _payment: self.payment,
            _callbackAddress: self.callback_address,
            _callbackFunctionId: self.callback_function_id,
            _expiration: self.expiration,
            _data: self.data,
        }
        .abi_encode()
        .into()
    }
}

/// Human-readable job id: UTF-8 with trailing NULs removed, hex otherwise
pub fn render_job_id(job_id: &B256) -> String {
    let trimmed = {
        let bytes = job_id.as_slice();
        let end = bytes.iter().rposition(|b| *b != 0).map(|i| i + 1).unwrap_or(0);
        &bytes[..end]
    };
    match std::str::from_utf8(trimmed) {
        Ok(text) if !text.is_empty() && !text.contains('\0') => text.to_string(),
        _ => job_id.to_string(),
    }
}
