//! Tradable instruments and symbol helpers

use serde::{Deserialize, Serialize};

/// Topic prefix for the per-instrument market snapshot feed
pub const SNAPSHOT_TOPIC_PREFIX: &str = "/market/snapshot:";

/// One tradable pair as listed by the exchange
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Exchange symbol, e.g. `BTC-USDT`
    pub symbol: String,
    /// Base currency, e.g. `BTC`
    pub base: String,
    /// Quote currency, e.g. `USDT`
    pub quote: String,
    /// Decimal places of the base increment
    pub base_precision: u32,
    /// Decimal places of the price increment
    pub quote_precision: u32,
    /// Whether the exchange currently accepts orders on this pair
    pub enable_trading: bool,
}

impl Instrument {
    /// WebSocket topic carrying this instrument's snapshots
    pub fn topic(&self) -> String {
        format!("{}{}", SNAPSHOT_TOPIC_PREFIX, self.symbol)
    }
}

/// Split an exchange symbol into `(base, quote)` on the configured separator
///
/// Returns `None` when the separator is absent or either side is empty.
pub fn split_symbol(symbol: &str, separator: char) -> Option<(&str, &str)> {
    let (base, quote) = symbol.split_once(separator)?;
    if base.is_empty() || quote.is_empty() {
        return None;
    }
    Some((base, quote))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_uses_symbol() {
        let instrument = Instrument {
            symbol: "ETH-BTC".to_string(),
            base: "ETH".to_string(),
            quote: "BTC".to_string(),
            base_precision: 7,
            quote_precision: 6,
            enable_trading: true,
        };
        assert_eq!(instrument.topic(), "/market/snapshot:ETH-BTC");
    }

    #[test]
    fn test_split_symbol() {
        assert_eq!(split_symbol("BTC-USDT", '-'), Some(("BTC", "USDT")));
        assert_eq!(split_symbol("BTCUSDT", '-'), None);
        assert_eq!(split_symbol("-USDT", '-'), None);
    }
}
