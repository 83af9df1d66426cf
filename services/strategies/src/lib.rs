//! # Price Movement Detectors
//!
//! Two independent per-instrument state machines fed by the snapshot stream:
//!
//! - [`StrikeState`]: a self-tightening buy-target ladder. Each time the price crosses the
//!   target a strike is counted and the target moves up by a fixed unit; from the second
//!   strike on every crossing produces a [`BuySignal`].
//! - [`ApeInState`]: a drop-from-high alert with a threshold that moves toward zero after
//!   every alert and decays back to its start value.
//!
//! Detectors never touch timers or the network. Each update returns an outcome naming the
//! timer to (re)arm and the signal to send; the owner schedules the timer and calls
//! `reset` when it fires.
//!
//! ```rust
//! use strategies::{StrikeConfig, StrikeState};
//! use rust_decimal::Decimal;
//!
//! let config = StrikeConfig::default();
//! let mut state = StrikeState::default();
//! let outcome = state.on_price(Decimal::from(100), 2, &config);
//! assert!(outcome.signal.is_none());
//! assert_eq!(state.buy_target_price(), Decimal::from(105));
//! ```

pub mod ape_in;
pub mod config;
pub mod signals;
pub mod strike;

pub use ape_in::{percent_change, ApeInOutcome, ApeInSignal, ApeInState};
pub use config::{ApeInConfig, DetectorConfig, StrikeConfig};
pub use signals::{service_starting, Signal};
pub use strike::{BuySignal, StrikeOutcome, StrikePhase, StrikeState};
