use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::chain::{ChainGateway, FulfillmentSigner, ReceiptStatus, UnsignedFulfillment};
use crate::config::SubmitConfig;
use crate::error::{PriceError, RecoveryError, RecoveryResult, SubmissionError};
use crate::fulfillment::{fulfillment_status, FulfillmentStatus};
use crate::journal::{JournalEntry, JournalKind, RecoveryJournal};
use crate::price::PriceAggregator;
use crate::request::FulfillmentArgs;

/// Token amounts on the wire carry 18 decimals
const TOKEN_DECIMALS: u32 = 18;

/// Gas price premium over the market price, in percent
const GAS_PRICE_BUMP_PERCENT: u128 = 110;

#[derive(Debug, Clone)]
pub struct SubmitterSettings {
    pub fee_token: String,
    pub gas_token: String,
    pub skip_unprofitable: bool,
    pub gas_limit_multiplier: Decimal,
    pub gas_price_refresh_interval: usize,
    pub confirmation_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl From<&SubmitConfig> for SubmitterSettings {
    fn from(config: &SubmitConfig) -> Self {
        Self {
            fee_token: config.fee_token.clone(),
            gas_token: config.gas_token.clone(),
            skip_unprofitable: config.skip_unprofitable,
            gas_limit_multiplier: config.gas_limit_multiplier,
            gas_price_refresh_interval: config.gas_price_refresh_interval.max(1),
            confirmation_timeout: config.confirmation_timeout,
            receipt_poll_interval: config.receipt_poll_interval,
        }
    }
}

/// USD prices fixed for the duration of one submission pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketPrices {
    pub fee_token_usd: Decimal,
    pub gas_token_usd: Decimal,
}

impl MarketPrices {
    pub async fn fetch(aggregator: &PriceAggregator, fee_token: &str, gas_token: &str) -> Result<Self, PriceError> {
        let fee = aggregator.aggregate(fee_token, "usd").await?;
        let gas = aggregator.aggregate(gas_token, "usd").await?;

        info!("Current {} price: ${}", fee_token.to_uppercase(), fee.value);
        info!("Current {} price: ${}", gas_token.to_uppercase(), gas.value);

        Ok(Self {
            fee_token_usd: fee.value,
            gas_token_usd: gas.value,
        })
    }
}

// ========== PROFITABILITY ==========

/// 18-decimal token amount as a `Decimal` of whole tokens
pub fn wei_to_tokens(wei: U256) -> Result<Decimal, SubmissionError> {
    let wei: u128 = wei.try_into().map_err(|_| SubmissionError::Arithmetic("token amount"))?;
    let wei = i128::try_from(wei).map_err(|_| SubmissionError::Arithmetic("token amount"))?;
    Decimal::try_from_i128_with_scale(wei, TOKEN_DECIMALS).map_err(|_| SubmissionError::Arithmetic("token amount"))
}

pub fn payment_usd(payment: U256, fee_token_usd: Decimal) -> Result<Decimal, SubmissionError> {
    wei_to_tokens(payment)?
        .checked_mul(fee_token_usd)
        .ok_or(SubmissionError::Arithmetic("payment value"))
}

/// `gasEstimate * gasPrice * multiplier / 1e18 * gasTokenUsd`
pub fn cost_usd(
    gas_estimate: u64,
    gas_price: u128,
    gas_limit_multiplier: Decimal,
    gas_token_usd: Decimal,
) -> Result<Decimal, SubmissionError> {
    let fee_wei = U256::from(gas_estimate) * U256::from(gas_price);
    wei_to_tokens(fee_wei)?
        .checked_mul(gas_limit_multiplier)
        .and_then(|v| v.checked_mul(gas_token_usd))
        .ok_or(SubmissionError::Arithmetic("transaction cost"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Fulfill,
    SkipUnprofitable,
}

pub fn decide(payment_usd: Decimal, cost_usd: Decimal, skip_unprofitable: bool) -> Decision {
    if cost_usd > payment_usd && skip_unprofitable {
        Decision::SkipUnprofitable
    } else {
        Decision::Fulfill
    }
}

pub fn bump_gas_price(gas_price: u128) -> Result<u128, SubmissionError> {
    gas_price
        .checked_mul(GAS_PRICE_BUMP_PERCENT)
        .map(|v| v / 100)
        .ok_or(SubmissionError::Arithmetic("gas price"))
}

/// Gas limit for the signed transaction, rounded up
pub fn scale_gas_limit(estimate: u64, multiplier: Decimal) -> Result<u64, SubmissionError> {
    Decimal::from(estimate)
        .checked_mul(multiplier)
        .and_then(|v| v.ceil().to_u64())
        .ok_or(SubmissionError::Arithmetic("gas limit"))
}

// ========== NONCE ==========

/// Local view of the next nonce, always checked against the chain.
#[derive(Debug, Default)]
pub struct NonceTracker {
    next: Option<u64>,
}

impl NonceTracker {
    /// Nonce to use given the chain's pending transaction count. A disagreement
    /// with the local expectation is surfaced and the tracker resyncs on the
    /// next call.
    pub fn reconcile(&mut self, on_chain: u64) -> Result<u64, SubmissionError> {
        match self.next {
            None => {
                self.next = Some(on_chain);
                Ok(on_chain)
            }
            Some(expected) if expected == on_chain => Ok(on_chain),
            Some(expected) => {
                self.next = None;
                Err(SubmissionError::NonceMismatch { expected, on_chain })
            }
        }
    }

    pub fn advance(&mut self, used: u64) {
        self.next = Some(used + 1);
    }

    pub fn invalidate(&mut self) {
        self.next = None;
    }

    pub fn expected(&self) -> Option<u64> {
        self.next
    }
}

// ========== SUBMISSION ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    AlreadyFulfilled,
    Unprofitable,
    Fulfilled(B256),
    /// Mined but the call reverted
    Reverted(B256),
    /// Accepted by the node and journaled, no receipt yet
    Unconfirmed(B256),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub total: usize,
    pub skipped_duplicates: usize,
    pub already_fulfilled: usize,
    pub unprofitable: usize,
    pub fulfilled: usize,
    pub reverted: usize,
    pub unconfirmed: usize,
    /// Left unresolved for the next pass
    pub failed: usize,
}

/// Per-pass mutable state threaded through record processing
struct PassState {
    chain_id: u64,
    market_gas_price: Option<u128>,
    nonce: NonceTracker,
}

/// Works through the pending journal strictly in order, one transaction at a
/// time.
pub struct ProfitabilitySubmitter {
    gateway: Arc<dyn ChainGateway>,
    journal: Arc<RecoveryJournal>,
    signer: FulfillmentSigner,
    oracle_address: Address,
    settings: SubmitterSettings,
}

impl ProfitabilitySubmitter {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        journal: Arc<RecoveryJournal>,
        signer: FulfillmentSigner,
        oracle_address: Address,
        settings: SubmitterSettings,
    ) -> Self {
        Self {
            gateway,
            journal,
            signer,
            oracle_address,
            settings,
        }
    }

    /// Price both tokens once, then run one submission pass. Without a quorum
    /// price nothing is submitted.
    pub async fn run(&self, aggregator: &PriceAggregator) -> RecoveryResult<SubmitReport> {
        let prices = MarketPrices::fetch(aggregator, &self.settings.fee_token, &self.settings.gas_token).await?;
        self.submit_all(&prices).await
    }

    /// One pass over the pending journal. Journal write failures abort the
    /// pass; any other per-record failure leaves that record for a later pass.
    pub async fn submit_all(&self, prices: &MarketPrices) -> RecoveryResult<SubmitReport> {
        let pending = self.journal.read(JournalKind::Pending).await?;
        let done = self.journal.request_ids(JournalKind::Fulfilled).await?;

        let mut report = SubmitReport {
            total: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            info!("📭 No pending requests in {}", self.journal.path(JournalKind::Pending).display());
            return Ok(report);
        }

        info!(
            "🚀 Submitting {} pending requests from {} ({} already fulfilled)",
            pending.len(),
            self.signer.address(),
            done.len()
        );

        let mut state = PassState {
            chain_id: self.gateway.chain_id().await?,
            market_gas_price: None,
            nonce: NonceTracker::default(),
        };
        let mut seen = HashSet::new();
        let mut evaluated = 0usize;

        for entry in &pending {
            let request_id = entry.request_id();
            if done.contains(&request_id) || !seen.insert(request_id) {
                debug!(request_id = %request_id, "Skipping request handled earlier");
                report.skipped_duplicates += 1;
                continue;
            }

            if evaluated % self.settings.gas_price_refresh_interval == 0 {
                state.market_gas_price = None;
            }
            evaluated += 1;

            match self.process(&entry.args, prices, &mut state).await {
                Ok(RecordOutcome::AlreadyFulfilled) => report.already_fulfilled += 1,
                Ok(RecordOutcome::Unprofitable) => report.unprofitable += 1,
                Ok(RecordOutcome::Fulfilled(_)) => report.fulfilled += 1,
                Ok(RecordOutcome::Reverted(_)) => report.reverted += 1,
                Ok(RecordOutcome::Unconfirmed(_)) => report.unconfirmed += 1,
                Err(e @ RecoveryError::Journal(_)) => return Err(e),
                Err(e) => {
                    error!(request_id = %request_id, "❌ Skipping request: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "✅ Submission pass complete: {} fulfilled, {} reverted, {} unconfirmed, {} unprofitable, {} already fulfilled, {} failed, {} skipped",
            report.fulfilled,
            report.reverted,
            report.unconfirmed,
            report.unprofitable,
            report.already_fulfilled,
            report.failed,
            report.skipped_duplicates
        );
        Ok(report)
    }

    async fn process(
        &self,
        args: &FulfillmentArgs,
        prices: &MarketPrices,
        state: &mut PassState,
    ) -> RecoveryResult<RecordOutcome> {
        if fulfillment_status(self.gateway.as_ref(), &args.request_id).await? == FulfillmentStatus::Fulfilled {
            info!(request_id = %args.request_id, "Request was fulfilled in the meantime, skipping");
            return Ok(RecordOutcome::AlreadyFulfilled);
        }

        let from = self.signer.address();
        let gas_estimate = self.gateway.estimate_fulfillment_gas(args, from).await?;
        let gas_price = match state.market_gas_price {
            Some(price) => price,
            None => {
                let price = self.gateway.gas_price().await?;
                state.market_gas_price = Some(price);
                price
            }
        };

        let payment = payment_usd(args.payment, prices.fee_token_usd)?;
        let cost = cost_usd(
            gas_estimate,
            gas_price,
            self.settings.gas_limit_multiplier,
            prices.gas_token_usd,
        )?;
        info!(
            request_id = %args.request_id,
            "Payment: ${} | Cost: ${}",
            payment.round_dp(6),
            cost.round_dp(6)
        );

        if decide(payment, cost, self.settings.skip_unprofitable) == Decision::SkipUnprofitable {
            info!("Won't fulfill the request because it's unprofitable. Saving to file.");
            self.journal
                .append(JournalKind::Unprofitable, &JournalEntry::resolved(args.clone()))
                .await?;
            return Ok(RecordOutcome::Unprofitable);
        }

        let on_chain = self.gateway.transaction_count(from).await?;
        let nonce = state.nonce.reconcile(on_chain)?;
        let market = self.gateway.gas_price().await?;
        state.market_gas_price = Some(market);

        let tx = UnsignedFulfillment {
            chain_id: state.chain_id,
            nonce,
            gas_price: bump_gas_price(market)?,
            gas_limit: scale_gas_limit(gas_estimate, self.settings.gas_limit_multiplier)?,
            to: self.oracle_address,
            input: args.calldata(),
        };
        let signed = self.signer.sign(&tx).await?;

        info!(request_id = %args.request_id, "Fulfilling request using nonce: {}", nonce);
        info!("Sent tx with hash: {}, waiting for confirmation...", signed.hash);

        match self.gateway.send_raw_transaction(&signed.raw).await {
            Ok(reported) => {
                if reported != signed.hash {
                    warn!("⚠️ Node reported hash {} for transaction {}", reported, signed.hash);
                }
                // The nonce is taken once the node holds the transaction
                state.nonce.advance(nonce);
                self.journal_fulfilled(args, signed.hash).await?;

                match self.await_receipt(signed.hash).await {
                    Some(status) => Ok(self.report_mined(args, signed.hash, status)),
                    None => {
                        warn!(
                            request_id = %args.request_id,
                            "⚠️ Transaction {} is journaled but not yet mined",
                            signed.hash
                        );
                        Ok(RecordOutcome::Unconfirmed(signed.hash))
                    }
                }
            }
            Err(broadcast_error) => {
                state.nonce.invalidate();
                warn!("⚠️ Broadcast of {} failed: {}", signed.hash, broadcast_error);

                // A rejected broadcast may still have been mined
                match self.gateway.transaction_receipt(signed.hash).await {
                    Ok(Some(status)) => {
                        state.nonce.advance(nonce);
                        self.journal_fulfilled(args, signed.hash).await?;
                        Ok(self.report_mined(args, signed.hash, status))
                    }
                    Ok(None) => Err(broadcast_error),
                    Err(lookup_error) => {
                        warn!("⚠️ Receipt lookup for {} failed: {}", signed.hash, lookup_error);
                        Err(SubmissionError::ReceiptAmbiguous { hash: signed.hash }.into())
                    }
                }
            }
        }
    }

    /// Poll until the transaction is mined or the confirmation window closes.
    /// Lookup errors count as "not yet mined".
    async fn await_receipt(&self, hash: B256) -> Option<ReceiptStatus> {
        let deadline = Instant::now() + self.settings.confirmation_timeout;
        loop {
            match self.gateway.transaction_receipt(hash).await {
                Ok(Some(status)) => return Some(status),
                Ok(None) => {}
                Err(e) => debug!("Receipt lookup for {} failed: {}", hash, e),
            }
            if Instant::now() >= deadline {
                warn!("⚠️ No receipt for {} after {:?}", hash, self.settings.confirmation_timeout);
                return None;
            }
            tokio::time::sleep(self.settings.receipt_poll_interval).await;
        }
    }

    /// A transaction the node holds is journaled as fulfilled whatever its
    /// eventual status, so the request is never signed a second time.
    async fn journal_fulfilled(&self, args: &FulfillmentArgs, hash: B256) -> RecoveryResult<()> {
        self.journal
            .append(
                JournalKind::Fulfilled,
                &JournalEntry::resolved(args.clone()).with_fulfillment_tx(hash),
            )
            .await?;
        Ok(())
    }

    fn report_mined(&self, args: &FulfillmentArgs, hash: B256, status: ReceiptStatus) -> RecordOutcome {
        match status {
            ReceiptStatus::Succeeded => {
                info!(request_id = %args.request_id, "✅ A new successfully sent tx {}", hash);
                RecordOutcome::Fulfilled(hash)
            }
            ReceiptStatus::Reverted => {
                warn!(request_id = %args.request_id, "⚠️ Transaction {} was mined but reverted", hash);
                RecordOutcome::Reverted(hash)
            }
        }
    }
}
