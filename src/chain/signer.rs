use std::str::FromStr;

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{keccak256, Address, Bytes, B256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;

use crate::error::{RecoveryError, RecoveryResult, SubmissionError};

/// Fully priced legacy transaction calling the oracle
#[derive(Debug, Clone)]
pub struct UnsignedFulfillment {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub input: Bytes,
}

#[derive(Debug, Clone)]
pub struct SignedFulfillment {
    pub hash: B256,
    pub raw: Vec<u8>,
}

/// Local key holder for the node account.
pub struct FulfillmentSigner {
    signer: PrivateKeySigner,
}

impl FulfillmentSigner {
    pub fn from_private_key(private_key: &str) -> RecoveryResult<Self> {
        let clean = private_key.trim().trim_start_matches("0x");
        let signer = PrivateKeySigner::from_str(clean)
            .map_err(|e| RecoveryError::Config(format!("PRIVATE_KEY is not a valid key: {}", e)))?;
        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign `tx` into its EIP-2718 wire form. The returned hash is the
    /// transaction hash the node will report for `raw`.
    pub async fn sign(&self, tx: &UnsignedFulfillment) -> Result<SignedFulfillment, SubmissionError> {
        let wallet = EthereumWallet::from(self.signer.clone());
        let request = TransactionRequest::default()
            .with_from(self.signer.address())
            .with_to(tx.to)
            .with_input(tx.input.clone())
            .with_chain_id(tx.chain_id)
            .with_nonce(tx.nonce)
            .with_gas_price(tx.gas_price)
            .with_gas_limit(tx.gas_limit);

        let envelope = request
            .build(&wallet)
            .await
            .map_err(|e| SubmissionError::Signing(e.to_string()))?;
        let raw = envelope.encoded_2718();

        Ok(SignedFulfillment {
            hash: keccak256(&raw),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::consensus::TxEnvelope;
    use alloy::eips::eip2718::Decodable2718;

    // Well-known development key (first anvil account)
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn unsigned(nonce: u64) -> UnsignedFulfillment {
        UnsignedFulfillment {
            chain_id: 1,
            nonce,
            gas_price: 55_000_000_000,
            gas_limit: 150_000,
            to: Address::repeat_byte(0x42),
            input: Bytes::from_static(&[0x4a, 0xb0, 0xd1, 0x90]),
        }
    }

    #[test]
    fn test_address_from_private_key() {
        let signer = FulfillmentSigner::from_private_key(DEV_KEY).unwrap();
        assert_eq!(signer.address(), Address::from_str(DEV_ADDRESS).unwrap());
    }

    #[test]
    fn test_rejects_garbage_key() {
        assert!(matches!(
            FulfillmentSigner::from_private_key("not-a-key"),
            Err(RecoveryError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_signed_legacy_transaction() {
        let signer = FulfillmentSigner::from_private_key(DEV_KEY).unwrap();
        let signed = signer.sign(&unsigned(7)).await.unwrap();

        assert_eq!(signed.hash, keccak256(&signed.raw));

        let envelope = TxEnvelope::decode_2718(&mut signed.raw.as_slice()).unwrap();
        match envelope {
            TxEnvelope::Legacy(tx) => {
                assert_eq!(tx.tx().nonce, 7);
                assert_eq!(tx.tx().gas_price, 55_000_000_000);
                assert_eq!(tx.tx().gas_limit, 150_000);
                assert_eq!(tx.tx().chain_id, Some(1));
                assert_eq!(tx.recover_signer().unwrap(), signer.address());
            }
            other => panic!("expected a legacy transaction, got {:?}", other),
        }
    }
}
