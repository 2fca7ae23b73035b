/// Where the quote lives inside a provider's JSON response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultPath {
    Single(&'static [&'static str]),
    /// Two related fields (e.g. best bid and best ask) averaged into one quote
    Mean(&'static [&'static str], &'static [&'static str]),
}

/// A public ticker endpoint. Quotes are requested against the USD-pegged
/// stablecoin market of each exchange where it has no USD book.
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn url(&self, from: &str, to: &str) -> String;

    fn path(&self) -> ResultPath;
}

pub struct Huobi;
pub struct Binance;
pub struct Coinbase;
pub struct Okx;
pub struct Bybit;
pub struct Kucoin;
pub struct GateIo;

impl PriceProvider for Huobi {
    fn name(&self) -> &'static str {
        "huobi"
    }

    fn url(&self, from: &str, to: &str) -> String {
        format!(
            "https://api.huobi.pro/market/trade?symbol={}{}t",
            from.to_lowercase(),
            to.to_lowercase()
        )
    }

    fn path(&self) -> ResultPath {
        ResultPath::Single(&["tick", "data", "0", "price"])
    }
}

impl PriceProvider for Binance {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn url(&self, from: &str, to: &str) -> String {
        format!(
            "https://api.binance.com/api/v3/ticker/price?symbol={}{}T",
            from.to_uppercase(),
            to.to_uppercase()
        )
    }

    fn path(&self) -> ResultPath {
        ResultPath::Single(&["price"])
    }
}

impl PriceProvider for Coinbase {
    fn name(&self) -> &'static str {
        "coinbase"
    }

    // Coinbase lists real USD books
    fn url(&self, from: &str, to: &str) -> String {
        format!(
            "https://api.exchange.coinbase.com/products/{}-{}/ticker",
            from.to_lowercase(),
            to.to_lowercase()
        )
    }

    fn path(&self) -> ResultPath {
        ResultPath::Single(&["price"])
    }
}

impl PriceProvider for Okx {
    fn name(&self) -> &'static str {
        "okx"
    }

    fn url(&self, from: &str, to: &str) -> String {
        format!(
            "https://www.okx.com/api/v5/market/ticker?instId={}-{}T",
            from.to_uppercase(),
            to.to_uppercase()
        )
    }

    fn path(&self) -> ResultPath {
        ResultPath::Single(&["data", "0", "last"])
    }
}

impl PriceProvider for Bybit {
    fn name(&self) -> &'static str {
        "bybit"
    }

    fn url(&self, from: &str, to: &str) -> String {
        format!(
            "https://api.bybit.com/spot/v3/public/quote/ticker/price?symbol={}{}T",
            from.to_uppercase(),
            to.to_uppercase()
        )
    }

    fn path(&self) -> ResultPath {
        ResultPath::Single(&["result", "price"])
    }
}

impl PriceProvider for Kucoin {
    fn name(&self) -> &'static str {
        "kucoin"
    }

    fn url(&self, from: &str, to: &str) -> String {
        format!(
            "https://api.kucoin.com/api/v1/market/orderbook/level1?symbol={}-{}T",
            from.to_uppercase(),
            to.to_uppercase()
        )
    }

    fn path(&self) -> ResultPath {
        ResultPath::Single(&["data", "price"])
    }
}

impl PriceProvider for GateIo {
    fn name(&self) -> &'static str {
        "gateio"
    }

    fn url(&self, from: &str, to: &str) -> String {
        format!(
            "https://api.gateio.ws/api/v4/spot/tickers?currency_pair={}_{}T",
            from.to_uppercase(),
            to.to_uppercase()
        )
    }

    fn path(&self) -> ResultPath {
        ResultPath::Mean(&["0", "highest_bid"], &["0", "lowest_ask"])
    }
}

/// Every built-in provider, in registration order
pub fn default_providers() -> Vec<Box<dyn PriceProvider>> {
    vec![
        Box::new(Huobi),
        Box::new(Binance),
        Box::new(Coinbase),
        Box::new(Okx),
        Box::new(Bybit),
        Box::new(Kucoin),
        Box::new(GateIo),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_conventions() {
        assert_eq!(
            Huobi.url("LINK", "usd"),
            "https://api.huobi.pro/market/trade?symbol=linkusdt"
        );
        assert_eq!(
            Binance.url("link", "usd"),
            "https://api.binance.com/api/v3/ticker/price?symbol=LINKUSDT"
        );
        assert_eq!(
            Coinbase.url("LINK", "USD"),
            "https://api.exchange.coinbase.com/products/link-usd/ticker"
        );
        assert_eq!(Kucoin.url("eth", "usd"), "https://api.kucoin.com/api/v1/market/orderbook/level1?symbol=ETH-USDT");
        assert_eq!(GateIo.url("eth", "usd"), "https://api.gateio.ws/api/v4/spot/tickers?currency_pair=ETH_USDT");
    }

    #[test]
    fn test_registry_names_are_unique() {
        let providers = default_providers();
        let mut names: Vec<_> = providers.iter().map(|p| p.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), providers.len());
        assert!(providers.iter().any(|p| matches!(p.path(), ResultPath::Mean(..))));
    }
}
