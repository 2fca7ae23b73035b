use alloy::network::{ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, TransactionRequest};
use alloy::sol_types::{SolCall, SolEvent};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use tracing::debug;

use super::abi;
use super::gateway::{classify_call_error, CallOutcome, ChainGateway, RawLog, ReceiptStatus};
use crate::config::ChainConfig;
use crate::error::{RecoveryError, RecoveryResult, SubmissionError};
use crate::request::FulfillmentArgs;

/// JSON-RPC gateway to an EVM node over HTTP
pub struct EvmGateway {
    provider: RootProvider<Http<Client>>,
    oracle_address: Address,
}

impl EvmGateway {
    pub fn connect(config: &ChainConfig) -> RecoveryResult<Self> {
        let url = config
            .rpc_url
            .parse()
            .map_err(|e| RecoveryError::Config(format!("RPC_URL is not a valid URL: {}", e)))?;

        Ok(Self {
            provider: ProviderBuilder::new().on_http(url),
            oracle_address: config.oracle_address,
        })
    }

    fn fulfillment_request(&self, args: &FulfillmentArgs, from: Address) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(from)
            .with_to(self.oracle_address)
            .with_input(args.calldata())
    }
}

#[async_trait]
impl ChainGateway for EvmGateway {
    async fn block_number(&self) -> RecoveryResult<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn chain_id(&self) -> RecoveryResult<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn request_logs(&self, from_block: u64, to_block: u64) -> RecoveryResult<Vec<RawLog>> {
        let filter = Filter::new()
            .address(self.oracle_address)
            .event_signature(abi::OracleRequest::SIGNATURE_HASH)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.provider.get_logs(&filter).await?;
        debug!("eth_getLogs {}..={} returned {} logs", from_block, to_block, logs.len());

        Ok(logs
            .into_iter()
            .map(|log| RawLog {
                topics: log.topics().to_vec(),
                data: log.data().data.clone(),
                block_number: log.block_number,
                transaction_hash: log.transaction_hash,
            })
            .collect())
    }

    async fn storage_at(&self, key: B256) -> RecoveryResult<B256> {
        let word = self
            .provider
            .get_storage_at(self.oracle_address, U256::from_be_bytes(key.0))
            .await?;
        Ok(B256::from(word.to_be_bytes::<32>()))
    }

    async fn call_fulfillment(&self, args: &FulfillmentArgs, from: Address) -> RecoveryResult<CallOutcome> {
        let request = self.fulfillment_request(args, from);

        match self.provider.call(&request).await {
            Ok(output) => {
                let decoded = abi::fulfillOracleRequestCall::abi_decode_returns(&output, true)
                    .map_err(|e| RecoveryError::Decode(format!("fulfillOracleRequest return: {}", e)))?;
                Ok(CallOutcome::Returned(decoded._0))
            }
            Err(err) => match err.as_error_resp() {
                Some(payload) => classify_call_error(payload.code, &payload.message),
                None => Err(err.into()),
            },
        }
    }

    async fn estimate_fulfillment_gas(&self, args: &FulfillmentArgs, from: Address) -> RecoveryResult<u64> {
        let request = self.fulfillment_request(args, from);
        self.provider
            .estimate_gas(&request)
            .await
            .map_err(|e| SubmissionError::GasEstimation(e.to_string()).into())
    }

    async fn gas_price(&self) -> RecoveryResult<u128> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn transaction_count(&self, account: Address) -> RecoveryResult<u64> {
        Ok(self.provider.get_transaction_count(account).pending().await?)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> RecoveryResult<B256> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| SubmissionError::Broadcast(e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: B256) -> RecoveryResult<Option<ReceiptStatus>> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;
        Ok(receipt.map(|r| {
            if r.status() {
                ReceiptStatus::Succeeded
            } else {
                ReceiptStatus::Reverted
            }
        }))
    }
}
