//! Strike ladder detector
//!
//! The first price seen arms a buy target one unit above it. While no strike has
//! happened, every lower price pulls the target down with it, so the target trails the
//! local low. Once the price reaches the target a strike is counted, the unit price is
//! fixed from that first target and the target steps up by one unit per strike. Signals
//! start from the second strike.

use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;
use types::round_to_precision;

use crate::config::StrikeConfig;

/// Coarse state of the ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikePhase {
    /// No target set
    Idle,
    /// Target set, no strike yet
    Armed,
    /// At least one strike counted
    Striking,
}

/// Buy signal raised from the second strike on
#[derive(Debug, Clone, PartialEq)]
pub struct BuySignal {
    /// Price that completed the strike
    pub price: Decimal,
    /// Strikes counted so far, including this one
    pub strike_count: u32,
    /// Whole-percent rise represented by the strikes
    pub percentage_increase: Decimal,
}

/// Result of feeding one price into the ladder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrikeOutcome {
    /// Set when a strike happened: cancel the pending reset timer and re-arm it for this long
    pub reset_after: Option<Duration>,
    /// Notification to send, if any
    pub signal: Option<BuySignal>,
}

/// Per-instrument ladder state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrikeState {
    buy_target_price: Decimal,
    strike_count: u32,
    strike_unit_price: Decimal,
}

impl StrikeState {
    pub fn buy_target_price(&self) -> Decimal {
        self.buy_target_price
    }

    pub fn strike_count(&self) -> u32 {
        self.strike_count
    }

    pub fn strike_unit_price(&self) -> Decimal {
        self.strike_unit_price
    }

    pub fn phase(&self) -> StrikePhase {
        if self.strike_count > 0 {
            StrikePhase::Striking
        } else if self.buy_target_price.is_zero() {
            StrikePhase::Idle
        } else {
            StrikePhase::Armed
        }
    }

    /// Feed the latest traded price, rounded targets use `quote_precision` decimal places
    pub fn on_price(
        &mut self,
        price: Decimal,
        quote_precision: u32,
        config: &StrikeConfig,
    ) -> StrikeOutcome {
        let candidate = if self.strike_count == 0 {
            price * (Decimal::ONE + config.unit_percent)
        } else {
            self.buy_target_price + self.strike_unit_price
        };
        let candidate = round_to_precision(candidate, quote_precision);

        if self.buy_target_price.is_zero() || candidate < self.buy_target_price {
            self.buy_target_price = candidate;
        }

        if self.buy_target_price.is_zero() || price < self.buy_target_price {
            return StrikeOutcome::default();
        }

        self.strike_count += 1;
        if self.strike_count == 1 {
            self.strike_unit_price = self.buy_target_price * config.unit_percent
                / (Decimal::ONE + config.unit_percent);
        }

        let signal = (self.strike_count > 1).then(|| BuySignal {
            price,
            strike_count: self.strike_count,
            percentage_increase: config.percentage_increase(self.strike_count),
        });

        debug!(
            price = %price,
            target = %self.buy_target_price,
            strikes = self.strike_count,
            "Strike"
        );
        self.buy_target_price += self.strike_unit_price;

        StrikeOutcome {
            reset_after: Some(config.reset_timeout(self.strike_count)),
            signal,
        }
    }

    /// Return to idle; called when the reset timer fires
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
