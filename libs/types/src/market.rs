//! Market data carried by the snapshot feed

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest traded price and rolling 24h high for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSnapshot {
    /// Exchange symbol, e.g. `BTC-USDT`
    pub symbol: String,
    /// Price of the most recent trade
    pub last_traded_price: Decimal,
    /// Highest traded price over the last 24 hours
    pub high: Decimal,
}
