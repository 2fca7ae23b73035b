pub mod abi;
pub mod evm;
pub mod gateway;
pub mod signer;

pub use evm::EvmGateway;
pub use gateway::{CallOutcome, ChainGateway, RawLog, ReceiptStatus};
pub use signer::{FulfillmentSigner, SignedFulfillment, UnsignedFulfillment};
