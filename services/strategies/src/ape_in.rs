//! Ape-in drop alert
//!
//! Compares the last traded price with the 24h high. A drop below the current threshold
//! raises an alert and moves the threshold toward 0 by the configured increment, so the
//! tolerance loosens after each alert. The threshold stays strictly negative: once the next
//! step would reach 0 it holds where it is. The owner arms a decay timer on each alert;
//! when it fires the threshold returns to its start value.

use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;

use crate::config::ApeInConfig;

/// A full wipe-out reads as -100% and is treated as bad data
const TOTAL_LOSS_PERCENT: Decimal = Decimal::from_parts(100, 0, 0, true, 0);

/// Percent change of `last` relative to `high`, rounded half-up to two decimals
///
/// Returns `None` when `high` is not positive.
pub fn percent_change(last: Decimal, high: Decimal) -> Option<Decimal> {
    if high <= Decimal::ZERO {
        return None;
    }
    let raw = (last - high) / high;
    let basis_points = (raw * Decimal::from(10_000) + Decimal::new(5, 1)).floor();
    Some(basis_points / Decimal::ONE_HUNDRED)
}

/// Drop alert raised when the change crosses the threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ApeInSignal {
    /// Percent change from the 24h high
    pub percent_change: Decimal,
}

/// Result of feeding one snapshot into the detector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApeInOutcome {
    /// Set on an alert: cancel the pending decay timer and re-arm it for this long
    pub decay_after: Option<Duration>,
    pub signal: Option<ApeInSignal>,
}

/// Per-instrument ape-in threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ApeInState {
    trigger_percentage: Decimal,
}

impl ApeInState {
    pub fn new(config: &ApeInConfig) -> Self {
        Self {
            trigger_percentage: config.start_percentage,
        }
    }

    pub fn trigger_percentage(&self) -> Decimal {
        self.trigger_percentage
    }

    /// Feed the latest price and 24h high
    pub fn on_snapshot(&mut self, last: Decimal, high: Decimal, config: &ApeInConfig) -> ApeInOutcome {
        let Some(change) = percent_change(last, high) else {
            return ApeInOutcome::default();
        };

        if change >= self.trigger_percentage || change == TOTAL_LOSS_PERCENT {
            return ApeInOutcome::default();
        }

        debug!(
            change = %change,
            threshold = %self.trigger_percentage,
            "Ape-in threshold crossed"
        );
        let next = self.trigger_percentage + config.increment_percentage;
        if next < Decimal::ZERO {
            self.trigger_percentage = next;
        }

        ApeInOutcome {
            decay_after: Some(config.decay),
            signal: Some(ApeInSignal {
                percent_change: change,
            }),
        }
    }

    /// Restore the start threshold; called when the decay timer fires
    pub fn reset(&mut self, config: &ApeInConfig) {
        self.trigger_percentage = config.start_percentage;
    }
}
