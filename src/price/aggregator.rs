use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::providers::default_providers;
use super::source::{HttpQuoteSource, QuoteSource};
use crate::config::PriceConfig;
use crate::error::PriceError;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub source: String,
    pub value: Decimal,
}

/// Median price of one aggregation round
#[derive(Debug, Clone)]
pub struct AggregatedPrice {
    pub from: String,
    pub to: String,
    pub value: Decimal,
    pub contributing_sources: Vec<String>,
    pub quotes: Vec<PriceQuote>,
    pub timestamp: DateTime<Utc>,
}

/// Fans a pair out to every source concurrently and reduces the answers
/// that arrive in time to their median.
pub struct PriceAggregator {
    sources: Vec<Arc<dyn QuoteSource>>,
    timeout: Duration,
    min_answers: usize,
}

impl PriceAggregator {
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>, config: &PriceConfig) -> Self {
        Self {
            sources,
            timeout: config.timeout,
            min_answers: config.min_answers,
        }
    }

    /// Aggregator over every built-in HTTP provider
    pub fn with_default_sources(config: &PriceConfig) -> Self {
        let client = Client::new();
        let sources = default_providers()
            .into_iter()
            .map(|provider| Arc::new(HttpQuoteSource::new(client.clone(), provider)) as Arc<dyn QuoteSource>)
            .collect();
        Self::new(sources, config)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub async fn aggregate(&self, from: &str, to: &str) -> Result<AggregatedPrice, PriceError> {
        let timeout = self.timeout;
        let fetches = self.sources.iter().map(|source| {
            let source = source.clone();
            async move {
                let outcome = match tokio::time::timeout(timeout, source.fetch(from, to)).await {
                    Ok(result) => result,
                    Err(_) => Err(PriceError::Timeout {
                        source_name: source.name().to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                };
                (source.name().to_string(), outcome)
            }
        });

        let results = futures::future::join_all(fetches).await;

        let mut quotes = Vec::new();
        for (source, result) in results {
            match result {
                Ok(value) => quotes.push(PriceQuote { source, value }),
                Err(e) => warn!("⚠️ Price source failed for {}/{}: {}", from, to, e),
            }
        }

        if quotes.len() < self.min_answers {
            return Err(PriceError::Quorum {
                from: from.to_string(),
                to: to.to_string(),
                received: quotes.len(),
                required: self.min_answers,
            });
        }

        let mut values: Vec<Decimal> = quotes.iter().map(|q| q.value).collect();
        let value = median(&mut values).ok_or_else(|| PriceError::Quorum {
            from: from.to_string(),
            to: to.to_string(),
            received: 0,
            required: self.min_answers.max(1),
        })?;

        info!(
            "💰 {}/{} = {} (median of {}/{} sources)",
            from.to_uppercase(),
            to.to_uppercase(),
            value,
            quotes.len(),
            self.sources.len()
        );

        Ok(AggregatedPrice {
            from: from.to_string(),
            to: to.to_string(),
            value,
            contributing_sources: quotes.iter().map(|q| q.source.clone()).collect(),
            quotes,
            timestamp: Utc::now(),
        })
    }
}

/// Middle value, or the mean of the two middle values for an even count.
/// The mean never overflows, even for quotes near `Decimal::MAX`.
pub fn median(values: &mut [Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    values.sort();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        let (lo, hi) = (values[mid - 1], values[mid]);
        Some(match hi.checked_sub(lo) {
            Some(spread) => lo + spread / Decimal::TWO,
            // opposite signs
            None => lo / Decimal::TWO + hi / Decimal::TWO,
        })
    }
}
