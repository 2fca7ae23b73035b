use alloy::primitives::B256;
use thiserror::Error;

/// Top-level error type for both recovery phases
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Price error: {0}")]
    Price(#[from] PriceError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Journal I/O error: {0}")]
    Journal(#[from] std::io::Error),
}

/// Price source and aggregation errors
#[derive(Error, Debug)]
pub enum PriceError {
    #[error("Request to {source_name} failed: {message}")]
    Transport { source_name: String, message: String },

    #[error("{source_name} did not answer within {timeout_ms}ms")]
    Timeout { source_name: String, timeout_ms: u64 },

    #[error("{source_name} response has no value at path {path}")]
    MissingField { source_name: String, path: String },

    #[error("{source_name} returned a non-numeric value: {value}")]
    InvalidNumber { source_name: String, value: String },

    #[error("Less than {required} fulfilled responses for {from}/{to} (got {received})")]
    Quorum {
        from: String,
        to: String,
        received: usize,
        required: usize,
    },
}

/// Errors raised while fulfilling a single journaled request.
///
/// These never abort a submission pass; the record stays unresolved and is
/// picked up again by the next pass.
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Broadcast rejected: {0}")]
    Broadcast(String),

    #[error("Nonce mismatch: expected {expected}, chain reports {on_chain}")]
    NonceMismatch { expected: u64, on_chain: u64 },

    #[error("Outcome of transaction {hash} could not be determined")]
    ReceiptAmbiguous { hash: B256 },

    #[error("Arithmetic overflow while computing {0}")]
    Arithmetic(&'static str),
}

impl From<serde_json::Error> for RecoveryError {
    fn from(error: serde_json::Error) -> Self {
        RecoveryError::Decode(format!("JSON error: {}", error))
    }
}

impl From<config::ConfigError> for RecoveryError {
    fn from(error: config::ConfigError) -> Self {
        RecoveryError::Config(error.to_string())
    }
}

impl From<alloy::transports::TransportError> for RecoveryError {
    fn from(error: alloy::transports::TransportError) -> Self {
        RecoveryError::Transport(error.to_string())
    }
}

/// Result type alias for the crate
pub type RecoveryResult<T> = Result<T, RecoveryError>;
