//! Per-base tracking state

use kucoin_adapter::TimerSlot;
use strategies::{ApeInState, DetectorConfig, StrikeState};
use types::{ConnectionId, Instrument, RequestId};

/// Where a tracked pair stands with its exchange subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Waiting for a connection slot
    Unassigned,
    /// Slot taken on a connection that is not open yet
    Reserved { connection: ConnectionId },
    /// Subscribe sent, ack outstanding
    Subscribing {
        connection: ConnectionId,
        request: RequestId,
    },
    /// Subscribe acknowledged
    Subscribed { connection: ConnectionId },
    /// Unsubscribe sent; the pair is dropped once it is acknowledged
    Unsubscribing {
        connection: ConnectionId,
        request: RequestId,
    },
}

impl SubscriptionState {
    /// Connection holding a slot for the pair
    pub fn slot(&self) -> Option<ConnectionId> {
        match *self {
            SubscriptionState::Unassigned => None,
            SubscriptionState::Reserved { connection }
            | SubscriptionState::Subscribing { connection, .. }
            | SubscriptionState::Subscribed { connection }
            | SubscriptionState::Unsubscribing { connection, .. } => Some(connection),
        }
    }

    /// Outstanding request, if any
    pub fn request(&self) -> Option<RequestId> {
        match *self {
            SubscriptionState::Subscribing { request, .. }
            | SubscriptionState::Unsubscribing { request, .. } => Some(request),
            _ => None,
        }
    }
}

/// Everything the coordinator keeps for one base symbol
#[derive(Debug)]
pub struct TrackedPair {
    pub instrument: Instrument,
    pub subscription: SubscriptionState,
    pub strike: StrikeState,
    pub strike_timer: TimerSlot,
    pub ape_in: ApeInState,
    pub ape_in_timer: TimerSlot,
    /// Order in which pairs were tracked; lower is older
    pub sequence: u64,
}

impl TrackedPair {
    pub fn new(instrument: Instrument, config: &DetectorConfig, sequence: u64) -> Self {
        Self {
            instrument,
            subscription: SubscriptionState::Unassigned,
            strike: StrikeState::default(),
            strike_timer: TimerSlot::new(),
            ape_in: ApeInState::new(&config.ape_in),
            ape_in_timer: TimerSlot::new(),
            sequence,
        }
    }

    pub fn base(&self) -> &str {
        &self.instrument.base
    }

    /// Connection the pair is subscribed on; only set once the subscribe is acknowledged
    pub fn connection(&self) -> Option<ConnectionId> {
        match self.subscription {
            SubscriptionState::Subscribed { connection } => Some(connection),
            _ => None,
        }
    }

    /// Whether pushes arriving on `connection` belong to this pair
    pub fn receives_from(&self, connection: ConnectionId) -> bool {
        matches!(
            self.subscription,
            SubscriptionState::Subscribing { connection: c, .. }
                | SubscriptionState::Subscribed { connection: c } if c == connection
        )
    }

    /// Stop both detector timers
    pub fn cancel_timers(&mut self) {
        self.strike_timer.cancel();
        self.ape_in_timer.cancel();
    }
}
