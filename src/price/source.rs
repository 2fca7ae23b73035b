use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

use super::providers::{PriceProvider, ResultPath};
use crate::error::PriceError;

/// One independent quote feed
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, from: &str, to: &str) -> Result<Decimal, PriceError>;
}

/// Quote source backed by a public HTTP ticker
pub struct HttpQuoteSource {
    client: Client,
    provider: Box<dyn PriceProvider>,
}

impl HttpQuoteSource {
    pub fn new(client: Client, provider: Box<dyn PriceProvider>) -> Self {
        Self { client, provider }
    }

    fn transport_error(&self, message: impl ToString) -> PriceError {
        PriceError::Transport {
            source_name: self.provider.name().to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn fetch(&self, from: &str, to: &str) -> Result<Decimal, PriceError> {
        let url = self.provider.url(from, to);
        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(e))?
            .error_for_status()
            .map_err(|e| self.transport_error(e))?;
        let body: Value = response.json().await.map_err(|e| self.transport_error(e))?;

        quote_from_body(self.provider.name(), &body, self.provider.path())
    }
}

/// Apply a provider's result path to a decoded response body
pub fn quote_from_body(source_name: &str, body: &Value, path: ResultPath) -> Result<Decimal, PriceError> {
    match path {
        ResultPath::Single(path) => extract_number(source_name, body, path),
        ResultPath::Mean(first, second) => {
            let a = extract_number(source_name, body, first)?;
            let b = extract_number(source_name, body, second)?;
            a.checked_add(b)
                .map(|sum| sum / Decimal::TWO)
                .ok_or_else(|| PriceError::InvalidNumber {
                    source_name: source_name.to_string(),
                    value: format!("{} + {}", a, b),
                })
        }
    }
}

/// Walk `path` through objects and arrays and read a positive number,
/// given either as a JSON number or a numeric string.
pub fn extract_number(source_name: &str, body: &Value, path: &[&str]) -> Result<Decimal, PriceError> {
    let mut node = body;
    for segment in path {
        let next = match node {
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            Value::Object(map) => map.get(*segment),
            _ => None,
        };
        node = next.ok_or_else(|| PriceError::MissingField {
            source_name: source_name.to_string(),
            path: path.join("."),
        })?;
    }

    let invalid = || PriceError::InvalidNumber {
        source_name: source_name.to_string(),
        value: node.to_string(),
    };
    let value = match node {
        Value::String(s) => Decimal::from_str(s.trim()).or_else(|_| Decimal::from_scientific(s.trim())),
        Value::Number(n) => Decimal::from_str(&n.to_string()).or_else(|_| Decimal::from_scientific(&n.to_string())),
        _ => return Err(invalid()),
    }
    .map_err(|_| invalid())?;

    if value <= Decimal::ZERO {
        return Err(invalid());
    }
    Ok(value)
}
