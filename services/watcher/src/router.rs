//! Feed router
//!
//! Hands each snapshot of a tracked pair to both detectors and (re)arms the detector
//! timers their outcomes ask for. Timer events carry the base symbol and the arm
//! generation so the coordinator can look the pair up again and drop stale firings.

use strategies::{DetectorConfig, Signal};
use tokio::sync::mpsc;
use tracing::debug;
use types::{RequestId, TradeSnapshot};

use crate::pair::TrackedPair;

/// Timer firing delivered to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Subscribe/unsubscribe was not acknowledged in time
    AckExpired(RequestId),
    /// Strike ladder went quiet for its timeout
    StrikeReset { base: String, generation: u64 },
    /// Ape-in threshold decays back to its start value
    ApeInDecay { base: String, generation: u64 },
}

/// Feed one snapshot to both detectors of `pair`
pub fn route_snapshot(
    pair: &mut TrackedPair,
    snapshot: &TradeSnapshot,
    config: &DetectorConfig,
    timers: &mpsc::Sender<TimerEvent>,
) -> Vec<Signal> {
    let mut signals = Vec::new();
    let base = pair.instrument.base.clone();

    let strike = pair.strike.on_price(
        snapshot.last_traded_price,
        pair.instrument.quote_precision,
        &config.strike,
    );
    if let Some(after) = strike.reset_after {
        let base = base.clone();
        pair.strike_timer
            .arm(timers, after, move |generation| TimerEvent::StrikeReset { base, generation });
        debug!(
            base = %pair.instrument.base,
            strikes = pair.strike.strike_count(),
            reset_secs = after.as_secs(),
            "Strike reset timer armed"
        );
    }
    if let Some(signal) = strike.signal {
        signals.push(Signal::Buy {
            symbol: pair.instrument.symbol.clone(),
            quote: pair.instrument.quote.clone(),
            signal,
        });
    }

    let ape_in = pair
        .ape_in
        .on_snapshot(snapshot.last_traded_price, snapshot.high, &config.ape_in);
    if let Some(after) = ape_in.decay_after {
        pair.ape_in_timer
            .arm(timers, after, move |generation| TimerEvent::ApeInDecay { base, generation });
    }
    if let Some(signal) = ape_in.signal {
        signals.push(Signal::ApeIn {
            symbol: pair.instrument.symbol.clone(),
            signal,
        });
    }

    signals
}
