//! Detector configuration

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Strike ladder parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrikeConfig {
    /// Fractional step between ladder rungs (0.05 = 5%)
    pub unit_percent: Decimal,

    /// Reset timeout per accumulated strike
    pub timeout_per_strike: Duration,
}

impl StrikeConfig {
    /// Time without a new strike after which the ladder is forgotten
    pub fn reset_timeout(&self, strike_count: u32) -> Duration {
        self.timeout_per_strike * strike_count
    }

    /// Whole-percent rise represented by `strike_count` rungs
    pub fn percentage_increase(&self, strike_count: u32) -> Decimal {
        (self.unit_percent * Decimal::from(strike_count) * Decimal::ONE_HUNDRED).floor()
    }
}

impl Default for StrikeConfig {
    fn default() -> Self {
        Self {
            unit_percent: Decimal::new(5, 2),                // 5%
            timeout_per_strike: Duration::from_secs(15 * 60), // 15 minutes
        }
    }
}

/// Ape-in alert parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApeInConfig {
    /// Initial (strictly negative) percent-from-high threshold
    pub start_percentage: Decimal,

    /// Non-negative amount added to the threshold after each alert, moving it toward 0
    pub increment_percentage: Decimal,

    /// How long a raised threshold survives before resetting to the start value
    pub decay: Duration,
}

impl Default for ApeInConfig {
    fn default() -> Self {
        Self {
            start_percentage: Decimal::from(-20),
            increment_percentage: Decimal::from(5),
            decay: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// Both detectors' parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub strike: StrikeConfig,
    pub ape_in: ApeInConfig,
}
