//! # Watcher Types Library
//!
//! Shared type system for the KuCoin watcher services.
//!
//! ## Design Philosophy
//!
//! - **Decimal Arithmetic**: Prices and percentages are `rust_decimal::Decimal`, never floats
//! - **Exchange Precision**: Every instrument carries the decimal places derived from its
//!   minimum increments, so rounding happens at the instrument's own scale
//! - **Type Safety**: Connection and request identifiers are distinct newtypes
//!
//! ## Quick Start
//!
//! ```rust
//! use types::Instrument;
//!
//! let btc = Instrument {
//!     symbol: "BTC-USDT".to_string(),
//!     base: "BTC".to_string(),
//!     quote: "USDT".to_string(),
//!     base_precision: 8,
//!     quote_precision: 1,
//!     enable_trading: true,
//! };
//! assert_eq!(btc.topic(), "/market/snapshot:BTC-USDT");
//! ```
//!
//! ## Integration Points
//!
//! - **Adapters**: REST symbol records are converted into [`Instrument`]s, WebSocket
//!   snapshot messages into [`TradeSnapshot`]s
//! - **Strategies**: detectors consume [`TradeSnapshot`] prices at the instrument's
//!   quote precision
//! - **Watcher**: the coordinator keys its registries by base symbol, [`ConnectionId`]
//!   and [`RequestId`]

pub mod identifiers;
pub mod instrument;
pub mod market;
pub mod notification;
pub mod precision;

pub use identifiers::{ConnectionId, RequestId, RequestKind};
pub use instrument::{split_symbol, Instrument};
pub use market::TradeSnapshot;
pub use notification::NotificationChannel;
pub use precision::{decimal_places, round_to_precision, PrecisionError};
