use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use config::{Config, Environment};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{RecoveryError, RecoveryResult};

const DEFAULT_STORAGE_DIR: &str = "./storage";
const DEFAULT_LOG_FILE: &str = "./chainlink-request-recover.log";

/// Upper bound of a scan range: a fixed block or the chain head at start-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndBlock {
    Latest,
    Number(u64),
}

impl FromStr for EndBlock {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(EndBlock::Latest);
        }
        s.parse::<u64>()
            .map(EndBlock::Number)
            .map_err(|_| RecoveryError::Config(format!("END_BLOCK must be a block number or \"latest\", got {:?}", s)))
    }
}

/// Process settings as read from `.env` and the environment.
///
/// Every key is optional here; each phase validates the subset it needs
/// through [`Settings::scan_config`], [`Settings::submit_config`] or
/// [`Settings::price_config`].
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub oracle_address: Option<String>,
    #[serde(default)]
    pub node_address: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub start_block: Option<u64>,
    #[serde(default)]
    pub end_block: Option<String>,
    #[serde(default)]
    pub block_interval: Option<u64>,
    #[serde(default)]
    pub fee_token: Option<String>,
    #[serde(default)]
    pub gas_token: Option<String>,
    #[serde(default)]
    pub gas_limit_multiplier: Option<String>,
    #[serde(default)]
    pub skip_unprofitable: Option<bool>,
    #[serde(default)]
    pub min_answers: Option<usize>,
    #[serde(default)]
    pub requests_timeout_ms: Option<u64>,
    #[serde(default)]
    pub gas_price_refresh_interval: Option<usize>,
    #[serde(default)]
    pub confirmation_timeout_secs: Option<u64>,
    #[serde(default)]
    pub receipt_poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub storage_dir: Option<String>,
    #[serde(default)]
    pub log_file: Option<String>,
}

/// Chain endpoint shared by both phases
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub oracle_address: Address,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub chain: ChainConfig,
    /// Account used for the read-only fulfillment simulation
    pub node_address: Address,
    pub start_block: u64,
    pub end_block: EndBlock,
    pub block_interval: u64,
}

#[derive(Debug, Clone)]
pub struct PriceConfig {
    pub min_answers: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SubmitConfig {
    pub chain: ChainConfig,
    pub private_key: String,
    pub fee_token: String,
    pub gas_token: String,
    pub skip_unprofitable: bool,
    pub gas_limit_multiplier: Decimal,
    pub gas_price_refresh_interval: usize,
    pub confirmation_timeout: Duration,
    pub receipt_poll_interval: Duration,
    pub price: PriceConfig,
}

impl Settings {
    /// Load settings from the process environment (after `.env` has been applied)
    pub fn from_env() -> RecoveryResult<Self> {
        Self::load(Environment::default())
    }

    fn load(environment: Environment) -> RecoveryResult<Self> {
        let settings = Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize::<Settings>()?;
        Ok(settings)
    }

    pub fn storage_dir(&self) -> PathBuf {
        PathBuf::from(self.storage_dir.as_deref().unwrap_or(DEFAULT_STORAGE_DIR))
    }

    pub fn log_file(&self) -> PathBuf {
        PathBuf::from(self.log_file.as_deref().unwrap_or(DEFAULT_LOG_FILE))
    }

    pub fn chain_config(&self) -> RecoveryResult<ChainConfig> {
        Ok(ChainConfig {
            rpc_url: required(&self.rpc_url, "RPC_URL")?.to_string(),
            oracle_address: parse_address(required(&self.oracle_address, "ORACLE_ADDRESS")?, "ORACLE_ADDRESS")?,
        })
    }

    pub fn scan_config(&self) -> RecoveryResult<ScanConfig> {
        let chain = self.chain_config()?;
        let node_address = parse_address(required(&self.node_address, "NODE_ADDRESS")?, "NODE_ADDRESS")?;
        let start_block = self
            .start_block
            .ok_or_else(|| RecoveryError::Config("START_BLOCK must be set".to_string()))?;
        let end_block: EndBlock = required(&self.end_block, "END_BLOCK")?.parse()?;
        let block_interval = self
            .block_interval
            .ok_or_else(|| RecoveryError::Config("BLOCK_INTERVAL must be set".to_string()))?;

        if block_interval == 0 {
            return Err(RecoveryError::Config("BLOCK_INTERVAL must be greater than zero".to_string()));
        }
        if let EndBlock::Number(end) = end_block {
            if end <= start_block {
                return Err(RecoveryError::Config(format!(
                    "END_BLOCK ({}) must be greater than START_BLOCK ({})",
                    end, start_block
                )));
            }
        }

        Ok(ScanConfig {
            chain,
            node_address,
            start_block,
            end_block,
            block_interval,
        })
    }

    pub fn price_config(&self) -> RecoveryResult<PriceConfig> {
        let min_answers = self.min_answers.unwrap_or(1);
        if min_answers == 0 {
            return Err(RecoveryError::Config("MIN_ANSWERS must be at least 1".to_string()));
        }

        Ok(PriceConfig {
            min_answers,
            timeout: Duration::from_millis(self.requests_timeout_ms.unwrap_or(1000)),
        })
    }

    pub fn submit_config(&self) -> RecoveryResult<SubmitConfig> {
        let chain = self.chain_config()?;
        let private_key = required(&self.private_key, "PRIVATE_KEY")?.to_string();
        let gas_token = required(&self.gas_token, "GAS_TOKEN")?.to_lowercase();

        let gas_limit_multiplier = match self.gas_limit_multiplier.as_deref() {
            Some(raw) => Decimal::from_str(raw.trim()).map_err(|_| {
                RecoveryError::Config(format!("GAS_LIMIT_MULTIPLIER is not a number: {:?}", raw))
            })?,
            None => Decimal::ONE,
        };
        if gas_limit_multiplier <= Decimal::ZERO {
            return Err(RecoveryError::Config("GAS_LIMIT_MULTIPLIER must be positive".to_string()));
        }

        let gas_price_refresh_interval = self.gas_price_refresh_interval.unwrap_or(25);
        if gas_price_refresh_interval == 0 {
            return Err(RecoveryError::Config(
                "GAS_PRICE_REFRESH_INTERVAL must be greater than zero".to_string(),
            ));
        }

        Ok(SubmitConfig {
            chain,
            private_key,
            fee_token: self.fee_token.as_deref().unwrap_or("link").to_lowercase(),
            gas_token,
            skip_unprofitable: self.skip_unprofitable.unwrap_or(true),
            gas_limit_multiplier,
            gas_price_refresh_interval,
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs.unwrap_or(120)),
            receipt_poll_interval: Duration::from_millis(self.receipt_poll_interval_ms.unwrap_or(2000)),
            price: self.price_config()?,
        })
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> RecoveryResult<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RecoveryError::Config(format!("{} must be set", key))),
    }
}

fn parse_address(raw: &str, key: &str) -> RecoveryResult<Address> {
    Address::from_str(raw).map_err(|e| RecoveryError::Config(format!("{} is not a valid address: {}", key, e)))
}
