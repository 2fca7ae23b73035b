use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;

use crate::error::{RecoveryError, RecoveryResult};
use crate::request::FulfillmentArgs;

/// JSON-RPC error code geth uses for a revert carrying return data
const REVERT_ERROR_CODE: i64 = 3;

/// One request-creation log as returned by `eth_getLogs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
}

/// Result of a read-only `fulfillOracleRequest` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Returned(bool),
    Reverted(String),
}

/// Sort a JSON-RPC error answering `eth_call` into a contract revert or a
/// node failure. Only reverts become a `CallOutcome`; rate limits, missing
/// headers and other node errors stay transport errors.
pub fn classify_call_error(code: i64, message: &str) -> RecoveryResult<CallOutcome> {
    let lower = message.to_ascii_lowercase();
    if code == REVERT_ERROR_CODE || lower.contains("revert") {
        Ok(CallOutcome::Reverted(message.to_string()))
    } else {
        Err(RecoveryError::Transport(format!("eth_call failed ({}): {}", code, message)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Succeeded,
    Reverted,
}

/// Chain capabilities consumed by the scanner and the submitter.
///
/// Every call is a single request/response against the configured endpoint;
/// callers decide which failures are fatal.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Current chain head
    async fn block_number(&self) -> RecoveryResult<u64>;

    async fn chain_id(&self) -> RecoveryResult<u64>;

    /// Request-creation logs of the oracle in `from_block..=to_block`
    async fn request_logs(&self, from_block: u64, to_block: u64) -> RecoveryResult<Vec<RawLog>>;

    /// Oracle storage word at `key`, read at the latest block
    async fn storage_at(&self, key: B256) -> RecoveryResult<B256>;

    /// Simulate the fulfillment call from `from` without sending a transaction.
    /// A contract revert is an `Ok(CallOutcome::Reverted)`, not an error.
    async fn call_fulfillment(&self, args: &FulfillmentArgs, from: Address) -> RecoveryResult<CallOutcome>;

    async fn estimate_fulfillment_gas(&self, args: &FulfillmentArgs, from: Address) -> RecoveryResult<u64>;

    /// Market gas price in wei
    async fn gas_price(&self) -> RecoveryResult<u128>;

    /// Transaction count of `account`, including pending transactions
    async fn transaction_count(&self, account: Address) -> RecoveryResult<u64>;

    /// Broadcast a signed transaction, returning the hash reported by the node
    async fn send_raw_transaction(&self, raw: &[u8]) -> RecoveryResult<B256>;

    /// `None` while the transaction is unknown or not yet mined
    async fn transaction_receipt(&self, hash: B256) -> RecoveryResult<Option<ReceiptStatus>>;
}

#[cfg(test)]
pub mod testing {
    //! In-memory chain used by the scanner and submitter tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use alloy::primitives::{keccak256, Address, Bytes, FixedBytes, B256, U256};
    use alloy::sol_types::SolEvent;
    use async_trait::async_trait;

    use super::*;
    use crate::chain::abi;
    use crate::fulfillment::commitment_storage_key;

    #[derive(Debug)]
    pub struct FakeState {
        pub head: u64,
        pub chain_id: u64,
        pub logs: Vec<RawLog>,
        pub storage: HashMap<B256, B256>,
        pub call_outcomes: HashMap<B256, CallOutcome>,
        /// Raw JSON-RPC errors (code, message) answering the simulation
        pub call_errors: HashMap<B256, (i64, String)>,
        pub gas_estimate: u64,
        pub gas_price: u128,
        pub nonce: u64,
        /// Reject every broadcast with a transport error
        pub reject_broadcasts: bool,
        /// Receipt recorded for rejected broadcasts (mined despite the error)
        pub rejected_receipt: Option<ReceiptStatus>,
        /// Receipt recorded for accepted broadcasts; `None` leaves them unmined
        pub accepted_receipt: Option<ReceiptStatus>,
        pub fail_receipt_lookups: bool,
        pub fail_logs_at: Option<u64>,
        pub receipts: HashMap<B256, ReceiptStatus>,
        pub broadcasts: Vec<Vec<u8>>,
        pub log_queries: Vec<(u64, u64)>,
        pub head_queries: usize,
        pub gas_price_queries: usize,
        pub nonce_queries: usize,
    }

    impl Default for FakeState {
        fn default() -> Self {
            Self {
                head: 0,
                chain_id: 1,
                logs: Vec::new(),
                storage: HashMap::new(),
                call_outcomes: HashMap::new(),
                call_errors: HashMap::new(),
                gas_estimate: 100_000,
                gas_price: 50_000_000_000,
                nonce: 0,
                reject_broadcasts: false,
                rejected_receipt: None,
                accepted_receipt: Some(ReceiptStatus::Succeeded),
                fail_receipt_lookups: false,
                fail_logs_at: None,
                receipts: HashMap::new(),
                broadcasts: Vec::new(),
                log_queries: Vec::new(),
                head_queries: 0,
                gas_price_queries: 0,
                nonce_queries: 0,
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct FakeGateway {
        pub state: Mutex<FakeState>,
    }

    impl FakeGateway {
        pub fn new(state: FakeState) -> Self {
            Self {
                state: Mutex::new(state),
            }
        }

        /// Mark a request as still awaiting fulfillment on-chain
        pub fn mark_pending(&self, request_id: B256) {
            self.state
                .lock()
                .unwrap()
                .storage
                .insert(commitment_storage_key(&request_id), B256::with_last_byte(0x5a));
        }

        pub fn mark_fulfilled(&self, request_id: B256) {
            self.state
                .lock()
                .unwrap()
                .storage
                .remove(&commitment_storage_key(&request_id));
        }
    }

    /// Encode a request-creation log the way the oracle emits it
    pub fn request_log(request_id: B256, payment: U256, block_number: u64) -> RawLog {
        let event = abi::OracleRequest {
            specId: B256::right_padding_from(b"3b4a1c9e2f0d4e6b8a7c5d3e1f0a2b4c"),
            requester: Address::repeat_byte(0x11),
            requestId: request_id,
            payment,
            callbackAddr: Address::repeat_byte(0x22),
            callbackFunctionId: FixedBytes::from([0xde, 0xad, 0xbe, 0xef]),
            cancelExpiration: U256::from(1_700_000_000u64),
            dataVersion: U256::from(1u64),
            data: Bytes::from_static(b"\x63get"),
        };
        let log_data = event.encode_log_data();

        RawLog {
            topics: log_data.topics().to_vec(),
            data: log_data.data.clone(),
            block_number: Some(block_number),
            transaction_hash: Some(keccak256(request_id)),
        }
    }

    fn transport(message: &str) -> RecoveryError {
        RecoveryError::Transport(message.to_string())
    }

    #[async_trait]
    impl ChainGateway for FakeGateway {
        async fn block_number(&self) -> RecoveryResult<u64> {
            let mut state = self.state.lock().unwrap();
            state.head_queries += 1;
            Ok(state.head)
        }

        async fn chain_id(&self) -> RecoveryResult<u64> {
            Ok(self.state.lock().unwrap().chain_id)
        }

        async fn request_logs(&self, from_block: u64, to_block: u64) -> RecoveryResult<Vec<RawLog>> {
            let mut state = self.state.lock().unwrap();
            state.log_queries.push((from_block, to_block));
            if let Some(bad) = state.fail_logs_at {
                if (from_block..=to_block).contains(&bad) {
                    return Err(transport("eth_getLogs failed"));
                }
            }
            Ok(state
                .logs
                .iter()
                .filter(|log| {
                    log.block_number
                        .map(|n| n >= from_block && n <= to_block)
                        .unwrap_or(false)
                })
                .cloned()
                .collect())
        }

        async fn storage_at(&self, key: B256) -> RecoveryResult<B256> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .storage
                .get(&key)
                .copied()
                .unwrap_or(B256::ZERO))
        }

        async fn call_fulfillment(&self, args: &FulfillmentArgs, _from: Address) -> RecoveryResult<CallOutcome> {
            let state = self.state.lock().unwrap();
            if let Some((code, message)) = state.call_errors.get(&args.request_id) {
                return classify_call_error(*code, message);
            }
            Ok(state
                .call_outcomes
                .get(&args.request_id)
                .cloned()
                .unwrap_or(CallOutcome::Returned(true)))
        }

        async fn estimate_fulfillment_gas(&self, _args: &FulfillmentArgs, _from: Address) -> RecoveryResult<u64> {
            Ok(self.state.lock().unwrap().gas_estimate)
        }

        async fn gas_price(&self) -> RecoveryResult<u128> {
            let mut state = self.state.lock().unwrap();
            state.gas_price_queries += 1;
            Ok(state.gas_price)
        }

        async fn transaction_count(&self, _account: Address) -> RecoveryResult<u64> {
            let mut state = self.state.lock().unwrap();
            state.nonce_queries += 1;
            Ok(state.nonce)
        }

        async fn send_raw_transaction(&self, raw: &[u8]) -> RecoveryResult<B256> {
            let mut state = self.state.lock().unwrap();
            let hash = keccak256(raw);
            state.broadcasts.push(raw.to_vec());

            if state.reject_broadcasts {
                if let Some(status) = state.rejected_receipt {
                    state.receipts.insert(hash, status);
                    state.nonce += 1;
                }
                return Err(transport("replacement transaction underpriced"));
            }

            state.nonce += 1;
            if let Some(status) = state.accepted_receipt {
                state.receipts.insert(hash, status);
            }
            Ok(hash)
        }

        async fn transaction_receipt(&self, hash: B256) -> RecoveryResult<Option<ReceiptStatus>> {
            let state = self.state.lock().unwrap();
            if state.fail_receipt_lookups {
                return Err(transport("eth_getTransactionReceipt failed"));
            }
            Ok(state.receipts.get(&hash).copied())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverts_are_call_outcomes() {
        assert_eq!(
            classify_call_error(3, "execution reverted: Must have a valid requestId").unwrap(),
            CallOutcome::Reverted("execution reverted: Must have a valid requestId".to_string())
        );
        assert!(matches!(
            classify_call_error(-32000, "execution reverted"),
            Ok(CallOutcome::Reverted(_))
        ));
        assert!(matches!(
            classify_call_error(-32603, "VM Exception while processing transaction: revert"),
            Ok(CallOutcome::Reverted(_))
        ));
    }

    #[test]
    fn test_node_failures_stay_errors() {
        for (code, message) in [
            (-32005, "limit exceeded"),
            (-32000, "header not found"),
            (-32603, "internal error"),
            (429, "Too Many Requests"),
        ] {
            assert!(
                matches!(classify_call_error(code, message), Err(RecoveryError::Transport(_))),
                "{} {} should be a transport error",
                code,
                message
            );
        }
    }
}
