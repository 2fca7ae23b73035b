//! Multi-source USD pricing used by the submitter.

pub mod aggregator;
pub mod providers;
pub mod source;

pub use aggregator::{median, AggregatedPrice, PriceAggregator, PriceQuote};
pub use providers::{default_providers, PriceProvider, ResultPath};
pub use source::{HttpQuoteSource, QuoteSource};
