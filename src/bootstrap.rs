use std::sync::Arc;

use tracing::info;

use crate::{
    chain::{EvmGateway, FulfillmentSigner},
    config::Settings,
    error::RecoveryResult,
    journal::RecoveryJournal,
    price::{AggregatedPrice, PriceAggregator},
    scanner::{FulfillmentScanner, ScanReport},
    submitter::{ProfitabilitySubmitter, SubmitReport, SubmitterSettings},
};

/// Scan phase: journal every outstanding request in the configured range
pub async fn run_scan(settings: &Settings) -> RecoveryResult<ScanReport> {
    info!("Initializing scan components ...");
    let config = settings.scan_config()?;

    let gateway = Arc::new(EvmGateway::connect(&config.chain)?);
    info!("✅ Chain gateway ready, oracle {}", config.chain.oracle_address);

    let journal = Arc::new(RecoveryJournal::new(settings.storage_dir()));
    info!("📂 Journals in {}", journal.dir().display());

    let scanner = FulfillmentScanner::new(gateway, journal, config.node_address);
    scanner
        .scan(config.start_block, config.end_block, config.block_interval)
        .await
}

/// Submit phase: price the tokens, then work through the pending journal
pub async fn run_submit(settings: &Settings) -> RecoveryResult<SubmitReport> {
    info!("Initializing submit components ...");
    let config = settings.submit_config()?;

    let gateway = Arc::new(EvmGateway::connect(&config.chain)?);
    let signer = FulfillmentSigner::from_private_key(&config.private_key)?;
    info!("🔑 Fulfilling from {}", signer.address());

    let aggregator = PriceAggregator::with_default_sources(&config.price);
    info!(
        "💱 Price aggregator with {} sources (quorum {}, timeout {:?})",
        aggregator.source_count(),
        config.price.min_answers,
        config.price.timeout
    );

    let journal = Arc::new(RecoveryJournal::new(settings.storage_dir()));
    let submitter = ProfitabilitySubmitter::new(
        gateway,
        journal,
        signer,
        config.chain.oracle_address,
        SubmitterSettings::from(&config),
    );

    submitter.run(&aggregator).await
}

/// One aggregation round for a pair
pub async fn run_price(settings: &Settings, from: &str, to: &str) -> RecoveryResult<AggregatedPrice> {
    let config = settings.price_config()?;
    let aggregator = PriceAggregator::with_default_sources(&config);
    Ok(aggregator.aggregate(from, to).await?)
}
