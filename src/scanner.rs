use std::sync::Arc;

use alloy::primitives::Address;
use tracing::{debug, info, warn};

use crate::chain::{CallOutcome, ChainGateway, RawLog};
use crate::config::EndBlock;
use crate::error::{RecoveryError, RecoveryResult};
use crate::fulfillment::{fulfillment_status, FulfillmentStatus};
use crate::journal::{JournalEntry, JournalKind, RecoveryJournal};
use crate::request::{render_job_id, OracleRequest};

/// Half-open block range `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockWindow {
    pub from: u64,
    pub to: u64,
}

impl BlockWindow {
    /// Inclusive upper bound, as `eth_getLogs` expects it
    pub fn last_block(&self) -> u64 {
        self.to - 1
    }
}

/// Split `[start, end)` into consecutive windows of `size` blocks, the last
/// one clipped to `end`.
pub fn block_windows(start: u64, end: u64, size: u64) -> Vec<BlockWindow> {
    let mut windows = Vec::new();
    if size == 0 {
        return windows;
    }
    let mut from = start;
    while from < end {
        let to = from.saturating_add(size).min(end);
        windows.push(BlockWindow { from, to });
        from = to;
    }
    windows
}

/// Share of `[start, end)` already behind `position`, in percent
pub fn progress_percent(start: u64, end: u64, position: u64) -> f64 {
    if end <= start {
        return 100.0;
    }
    (position.saturating_sub(start)) as f64 / (end - start) as f64 * 100.0
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub from_block: u64,
    pub to_block: u64,
    pub windows: usize,
    pub events: usize,
    /// Journaled as pending
    pub pending: usize,
    pub already_fulfilled: usize,
    /// Still open on-chain but the fulfillment call would fail
    pub unfulfillable: usize,
}

/// Walks a block range window by window and journals every request that is
/// still awaiting fulfillment.
pub struct FulfillmentScanner {
    gateway: Arc<dyn ChainGateway>,
    journal: Arc<RecoveryJournal>,
    node_address: Address,
}

impl FulfillmentScanner {
    pub fn new(gateway: Arc<dyn ChainGateway>, journal: Arc<RecoveryJournal>, node_address: Address) -> Self {
        Self {
            gateway,
            journal,
            node_address,
        }
    }

    /// Scan `[start_block, end_block)`. The end is resolved once, before the
    /// first window. Any transport or decode failure aborts the scan.
    pub async fn scan(&self, start_block: u64, end_block: EndBlock, window_size: u64) -> RecoveryResult<ScanReport> {
        if window_size == 0 {
            return Err(RecoveryError::Config("window size must be greater than zero".to_string()));
        }

        let end = match end_block {
            EndBlock::Number(n) => n,
            EndBlock::Latest => {
                let head = self.gateway.block_number().await?;
                info!("📍 Resolved latest block to {}", head);
                head
            }
        };

        let mut report = ScanReport {
            from_block: start_block,
            to_block: end,
            ..Default::default()
        };
        if end <= start_block {
            warn!("⚠️ Nothing to scan: end block {} is not above start block {}", end, start_block);
            return Ok(report);
        }

        let total = end - start_block;
        info!(
            "🔍 Scanning blocks {}..{} ({} blocks, window {})",
            start_block, end, total, window_size
        );

        for window in block_windows(start_block, end, window_size) {
            info!(
                "Processing blocks: {}-{} | Progress: {}/{} ({:.3}%)",
                window.from,
                window.to,
                window.from - start_block,
                total,
                progress_percent(start_block, end, window.from)
            );

            let logs = self.gateway.request_logs(window.from, window.last_block()).await?;
            report.windows += 1;
            if logs.is_empty() {
                continue;
            }

            info!("We got {} request events. Start processing...", logs.len());
            report.events += logs.len();
            for log in &logs {
                self.process_log(log, &mut report).await?;
            }
        }

        info!(
            "✅ Scan complete: {} events, {} pending, {} already fulfilled, {} unfulfillable",
            report.events, report.pending, report.already_fulfilled, report.unfulfillable
        );
        Ok(report)
    }

    async fn process_log(&self, log: &RawLog, report: &mut ScanReport) -> RecoveryResult<()> {
        let request = OracleRequest::decode(log)?;

        if fulfillment_status(self.gateway.as_ref(), &request.request_id).await? == FulfillmentStatus::Fulfilled {
            debug!(request_id = %request.request_id, "Request already fulfilled");
            report.already_fulfilled += 1;
            return Ok(());
        }

        info!(
            request_id = %request.request_id,
            "Request without fulfillment found for job: {}! Block number is {}",
            render_job_id(&request.job_id),
            request.block_number
        );

        let args = request.fulfillment_args();
        match self.gateway.call_fulfillment(&args, self.node_address).await? {
            CallOutcome::Returned(true) => {
                self.journal
                    .append(JournalKind::Pending, &JournalEntry::pending(&request))
                    .await?;
                report.pending += 1;
            }
            CallOutcome::Returned(false) => {
                warn!(
                    request_id = %request.request_id,
                    tx = %request.transaction_hash,
                    "❌ Something wrong with this request, we cannot fulfill it (call returned false)"
                );
                report.unfulfillable += 1;
            }
            CallOutcome::Reverted(reason) => {
                warn!(
                    request_id = %request.request_id,
                    tx = %request.transaction_hash,
                    "❌ Something wrong with this request, we cannot fulfill it: {}",
                    reason
                );
                report.unfulfillable += 1;
            }
        }

        Ok(())
    }
}
