//! Coordinator actor
//!
//! The single owner of every registry: tracked pairs, the connection pool and the
//! acknowledgment tracker. Connection tasks, timers and the reconciler talk to it over
//! channels, and each handler runs to completion before the next event is taken, so
//! per-pair state is never mutated concurrently.
//!
//! ## Subscription lifecycle
//!
//! ```text
//! Unassigned ──reserve──▶ Reserved ──Opened──▶ Subscribing ──Ack──▶ Subscribed
//!      ▲                     │ (connection          │                   │
//!      │                     │  already open)       │ retry: new id     │ removed
//!      │                     └──────────────────────┘                   ▼
//!      └──────────── connection Closed ◀──────────────────────── Unsubscribing ──Ack──▶ dropped
//! ```

use kucoin_adapter::{
    pacing_interval, AckTracker, ConnectionEvent, ConnectionPool, Connector, ExpiredRequest,
    NotificationDispatcher, OutboundMessage, PendingRequest,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use strategies::DetectorConfig;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use types::{split_symbol, ConnectionId, Instrument, RequestId, RequestKind, TradeSnapshot};

use crate::config::WatcherConfig;
use crate::error::Result;
use crate::pair::{SubscriptionState, TrackedPair};
use crate::reconciler::UniverseUpdate;
use crate::router::{route_snapshot, TimerEvent};
use crate::universe::diff_universe;

const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Receiving ends of the coordinator's own channels
pub struct CoordinatorInbox {
    connection_events: mpsc::Receiver<ConnectionEvent>,
    timer_events: mpsc::Receiver<TimerEvent>,
}

pub struct Coordinator {
    pairs: BTreeMap<String, TrackedPair>,
    pool: ConnectionPool,
    tracker: AckTracker<TimerEvent>,
    timers: mpsc::Sender<TimerEvent>,
    detectors: DetectorConfig,
    quote_assets: Vec<String>,
    separator: char,
    notifier: NotificationDispatcher,
    user_name: String,
    next_sequence: u64,
}

impl Coordinator {
    pub fn new(
        config: &WatcherConfig,
        connector: Arc<dyn Connector>,
        notifier: NotificationDispatcher,
    ) -> Result<(Self, CoordinatorInbox)> {
        let (connection_tx, connection_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (timer_tx, timer_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let pacing = pacing_interval(config.connection.message_rate()?);
        let pool = ConnectionPool::new(
            connector,
            connection_tx,
            config.connection.max_subscriptions_per_connection,
        )?;
        let tracker = AckTracker::new(pacing, timer_tx.clone(), TimerEvent::AckExpired);

        let coordinator = Self {
            pairs: BTreeMap::new(),
            pool,
            tracker,
            timers: timer_tx,
            detectors: config.detectors.clone(),
            quote_assets: config.quote_assets.clone(),
            separator: config.symbol_separator,
            notifier,
            user_name: config.user_name.clone(),
            next_sequence: 1,
        };
        let inbox = CoordinatorInbox {
            connection_events: connection_rx,
            timer_events: timer_rx,
        };
        Ok((coordinator, inbox))
    }

    /// Process events until the universe channel closes, then close every connection
    pub async fn run(mut self, mut inbox: CoordinatorInbox, mut universe: mpsc::Receiver<UniverseUpdate>) {
        info!("Coordinator started");
        loop {
            tokio::select! {
                update = universe.recv() => match update {
                    Some(update) => self.handle_universe(update),
                    None => break,
                },
                Some(event) = inbox.connection_events.recv() => self.handle_connection_event(event),
                Some(event) = inbox.timer_events.recv() => self.handle_timer(event),
            }
        }

        self.tracker.clear();
        self.pool.close_all();
        info!(pairs = self.pairs.len(), "Coordinator stopped");
    }

    pub fn pair(&self, base: &str) -> Option<&TrackedPair> {
        self.pairs.get(base)
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn connection_count(&self) -> usize {
        self.pool.len()
    }

    pub fn pending_requests(&self) -> usize {
        self.tracker.len()
    }

    fn handle_universe(&mut self, update: UniverseUpdate) {
        let instruments = match update {
            UniverseUpdate::Snapshot(instruments) => instruments,
            UniverseUpdate::Failed(reason) => {
                error!(reason = %reason, pairs = self.pairs.len(), "Reconciliation failed, discarding all state");
                self.reset();
                return;
            }
        };

        let diff = diff_universe(
            self.pairs.values().map(|pair| &pair.instrument),
            &instruments,
            &self.quote_assets,
        );
        if diff.is_empty() {
            debug!(tracked = self.pairs.len(), "Universe unchanged");
            return;
        }
        info!(
            added = diff.added.len(),
            removed = diff.removed.len(),
            unchanged = diff.unchanged.len(),
            "Universe changed"
        );

        let mut removed = diff.removed;
        removed.sort_by_key(|base| self.pairs.get(base).map(|pair| pair.sequence));
        for base in removed {
            self.untrack(&base);
        }

        for instrument in diff.added {
            self.track(instrument);
        }
        self.assign_pending();
    }

    fn track(&mut self, instrument: Instrument) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        debug!(symbol = %instrument.symbol, "Tracking pair");
        let pair = TrackedPair::new(instrument, &self.detectors, sequence);
        self.pairs.insert(pair.base().to_string(), pair);
    }

    fn untrack(&mut self, base: &str) {
        let Some(pair) = self.pairs.get_mut(base) else {
            return;
        };
        pair.cancel_timers();

        let state = pair.subscription;
        match state {
            SubscriptionState::Unassigned => {
                self.pairs.remove(base);
            }
            SubscriptionState::Reserved { connection } => {
                self.pool.release(connection);
                self.pairs.remove(base);
            }
            SubscriptionState::Subscribing { connection, request } => {
                self.tracker.ack(request);
                let request = send_request(&mut self.tracker, &self.pool, pair, RequestKind::Unsubscribe, connection);
                pair.subscription = SubscriptionState::Unsubscribing { connection, request };
            }
            SubscriptionState::Subscribed { connection } => {
                let request = send_request(&mut self.tracker, &self.pool, pair, RequestKind::Unsubscribe, connection);
                pair.subscription = SubscriptionState::Unsubscribing { connection, request };
            }
            SubscriptionState::Unsubscribing { .. } => {}
        }
    }

    /// Give every unassigned pair a slot, subscribing right away on open connections
    fn assign_pending(&mut self) {
        let mut pending: Vec<(u64, String)> = self
            .pairs
            .values()
            .filter(|pair| pair.subscription == SubscriptionState::Unassigned)
            .map(|pair| (pair.sequence, pair.base().to_string()))
            .collect();
        pending.sort();

        for (_, base) in pending {
            let connection = self.pool.reserve();
            let Some(pair) = self.pairs.get_mut(&base) else {
                continue;
            };
            pair.subscription = if self.pool.is_open(connection) {
                let request = send_request(&mut self.tracker, &self.pool, pair, RequestKind::Subscribe, connection);
                SubscriptionState::Subscribing { connection, request }
            } else {
                SubscriptionState::Reserved { connection }
            };
        }
    }

    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened { connection } => self.on_opened(connection),
            ConnectionEvent::Ack { connection, request } => self.on_ack(connection, request),
            ConnectionEvent::Snapshot { connection, snapshot } => self.on_snapshot(connection, snapshot),
            ConnectionEvent::Closed { connection, reason } => {
                if !self.pool.remove(connection) {
                    debug!(connection = %connection, "Close for unknown connection");
                    return;
                }
                let cancelled = self.tracker.cancel_connection(connection);

                let mut regrouped = 0;
                self.pairs.retain(|_, pair| {
                    if pair.subscription.slot() != Some(connection) {
                        return true;
                    }
                    if matches!(pair.subscription, SubscriptionState::Unsubscribing { .. }) {
                        return false;
                    }
                    pair.subscription = SubscriptionState::Unassigned;
                    regrouped += 1;
                    true
                });
                warn!(
                    connection = %connection,
                    reason = %reason,
                    regrouped,
                    cancelled_requests = cancelled.len(),
                    "Connection closed"
                );
                self.assign_pending();
            }
        }
    }

    fn on_opened(&mut self, connection: ConnectionId) {
        if !self.pool.mark_open(connection) {
            debug!(connection = %connection, "Welcome for unknown connection");
            return;
        }

        let mut subscribed = 0;
        for pair in self.pairs.values_mut() {
            if pair.subscription == (SubscriptionState::Reserved { connection }) {
                let request = send_request(&mut self.tracker, &self.pool, pair, RequestKind::Subscribe, connection);
                pair.subscription = SubscriptionState::Subscribing { connection, request };
                subscribed += 1;
            }
        }
        info!(connection = %connection, subscribing = subscribed, "Connection open");
    }

    fn on_ack(&mut self, connection: ConnectionId, request: RequestId) {
        match self.tracker.get(request) {
            None => {
                debug!(connection = %connection, request = %request, "Ack for unknown request");
                return;
            }
            Some(pending) if pending.connection != connection => {
                debug!(
                    connection = %connection,
                    expected = %pending.connection,
                    request = %request,
                    "Ack on unexpected connection"
                );
                return;
            }
            Some(_) => {}
        }
        let Some((live, pending)) = self.tracker.ack(request) else {
            return;
        };
        let Some(pair) = self.pairs.get_mut(&pending.base) else {
            return;
        };
        if pair.subscription.request() != Some(live) {
            return;
        }

        match pending.kind {
            RequestKind::Subscribe => {
                pair.subscription = SubscriptionState::Subscribed {
                    connection: pending.connection,
                };
                debug!(symbol = %pair.instrument.symbol, connection = %pending.connection, "Subscribed");
            }
            RequestKind::Unsubscribe => {
                info!(symbol = %pair.instrument.symbol, "Pair untracked");
                self.pairs.remove(&pending.base);
                self.pool.release(pending.connection);
            }
        }
    }

    fn on_snapshot(&mut self, connection: ConnectionId, snapshot: TradeSnapshot) {
        let Some((base, _)) = split_symbol(&snapshot.symbol, self.separator) else {
            debug!(symbol = %snapshot.symbol, "Snapshot for malformed symbol");
            return;
        };
        let Some(pair) = self.pairs.get_mut(base) else {
            return;
        };
        if pair.instrument.symbol != snapshot.symbol || !pair.receives_from(connection) {
            return;
        }

        for signal in route_snapshot(pair, &snapshot, &self.detectors, &self.timers) {
            info!(symbol = %signal.symbol(), channel = %signal.channel(), "Signal");
            self.notifier.dispatch(signal.render(&self.user_name), signal.channel());
        }
    }

    fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::AckExpired(request) => {
                let Some(expired) = self.tracker.expire(request) else {
                    return;
                };
                let Some(pair) = self.pairs.get_mut(&expired.request.base) else {
                    return;
                };
                if pair.subscription.request() != Some(request) {
                    return;
                }

                let kind = expired.request.kind;
                let connection = expired.request.connection;
                let retry = resend_request(&mut self.tracker, &self.pool, expired);
                pair.subscription = match kind {
                    RequestKind::Subscribe => SubscriptionState::Subscribing {
                        connection,
                        request: retry,
                    },
                    RequestKind::Unsubscribe => SubscriptionState::Unsubscribing {
                        connection,
                        request: retry,
                    },
                };
                warn!(
                    symbol = %pair.instrument.symbol,
                    kind = %kind,
                    expired = %request,
                    retry = %retry,
                    "Request not acknowledged, resending"
                );
            }
            TimerEvent::StrikeReset { base, generation } => {
                if let Some(pair) = self.pairs.get_mut(&base) {
                    if pair.strike_timer.fire(generation) {
                        debug!(base = %base, strikes = pair.strike.strike_count(), "Strike ladder reset");
                        pair.strike.reset();
                    }
                }
            }
            TimerEvent::ApeInDecay { base, generation } => {
                if let Some(pair) = self.pairs.get_mut(&base) {
                    if pair.ape_in_timer.fire(generation) {
                        debug!(base = %base, "Ape-in threshold reset");
                        pair.ape_in.reset(&self.detectors.ape_in);
                    }
                }
            }
        }
    }

    /// Drop every pair, request and connection
    fn reset(&mut self) {
        self.tracker.clear();
        self.pool.close_all();
        self.pairs.clear();
    }
}

/// Register a request with the tracker and queue it on `connection`
fn send_request(
    tracker: &mut AckTracker<TimerEvent>,
    pool: &ConnectionPool,
    pair: &TrackedPair,
    kind: RequestKind,
    connection: ConnectionId,
) -> RequestId {
    let topic = pair.instrument.topic();
    let request = tracker.track(PendingRequest {
        base: pair.base().to_string(),
        kind,
        connection,
        topic: topic.clone(),
    });
    queue_request(pool, connection, request, kind, topic);
    request
}

/// Queue an expired request again under a fresh id
fn resend_request(tracker: &mut AckTracker<TimerEvent>, pool: &ConnectionPool, expired: ExpiredRequest) -> RequestId {
    let kind = expired.request.kind;
    let connection = expired.request.connection;
    let topic = expired.request.topic.clone();
    let request = tracker.retry(expired);
    queue_request(pool, connection, request, kind, topic);
    request
}

fn queue_request(pool: &ConnectionPool, connection: ConnectionId, request: RequestId, kind: RequestKind, topic: String) {
    if let Err(e) = pool.send(connection, OutboundMessage::request(request, kind, topic)) {
        // The retry timer resends, or the close event regroups the pair
        warn!(connection = %connection, request = %request, error = %e, "Failed to queue request");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kucoin_adapter::{ConnectionCommand, ConnectionHandle, DisconnectReason, Notifier, OutboundKind};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use types::NotificationChannel;

    #[derive(Default)]
    struct FakeConnector {
        opened: Mutex<Vec<(ConnectionId, mpsc::UnboundedReceiver<ConnectionCommand>)>>,
    }

    impl Connector for FakeConnector {
        fn open(&self, id: ConnectionId, _events: mpsc::Sender<ConnectionEvent>) -> ConnectionHandle {
            let (tx, rx) = mpsc::unbounded_channel();
            self.opened.lock().push((id, rx));
            ConnectionHandle::new(id, tx)
        }
    }

    impl FakeConnector {
        /// Drain queued requests on `connection`
        fn sent(&self, connection: ConnectionId) -> Vec<OutboundMessage> {
            let mut opened = self.opened.lock();
            let Some((_, rx)) = opened.iter_mut().find(|(id, _)| *id == connection) else {
                return Vec::new();
            };
            let mut sent = Vec::new();
            while let Ok(command) = rx.try_recv() {
                if let ConnectionCommand::Send(message) = command {
                    sent.push(message);
                }
            }
            sent
        }

        fn opened(&self) -> usize {
            self.opened.lock().len()
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, NotificationChannel)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn notifier_type(&self) -> &str {
            "recording"
        }

        async fn send(&self, text: &str, channel: NotificationChannel) -> kucoin_adapter::Result<()> {
            self.sent.lock().push((text.to_string(), channel));
            Ok(())
        }
    }

    struct Harness {
        coordinator: Coordinator,
        connector: Arc<FakeConnector>,
        notifier: Arc<RecordingNotifier>,
        inbox: CoordinatorInbox,
    }

    fn harness(max_subscriptions: usize) -> Harness {
        let mut config = WatcherConfig::default();
        config.connection.max_subscriptions_per_connection = max_subscriptions;
        config.connection.max_messages_per_second = 10;

        let connector = Arc::new(FakeConnector::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = NotificationDispatcher::new(notifier.clone(), config.notification_retry.clone());
        let (coordinator, inbox) = Coordinator::new(&config, connector.clone(), dispatcher).unwrap();
        Harness {
            coordinator,
            connector,
            notifier,
            inbox,
        }
    }

    fn instrument(base: &str) -> Instrument {
        Instrument {
            symbol: format!("{}-USDT", base),
            base: base.to_string(),
            quote: "USDT".to_string(),
            base_precision: 8,
            quote_precision: 2,
            enable_trading: true,
        }
    }

    fn universe(bases: &[&str]) -> UniverseUpdate {
        UniverseUpdate::Snapshot(bases.iter().map(|base| instrument(base)).collect())
    }

    fn ack_all(h: &mut Harness, connection: ConnectionId) -> usize {
        let sent = h.connector.sent(connection);
        for message in &sent {
            let request = RequestId::from_wire(&message.id).unwrap();
            h.coordinator.handle_connection_event(ConnectionEvent::Ack { connection, request });
        }
        sent.len()
    }

    fn open(h: &mut Harness, connection: u64) -> ConnectionId {
        let connection = ConnectionId::new(connection);
        h.coordinator.handle_connection_event(ConnectionEvent::Opened { connection });
        connection
    }

    fn tick(h: &mut Harness, connection: ConnectionId, base: &str, last: rust_decimal::Decimal, high: rust_decimal::Decimal) {
        h.coordinator.handle_connection_event(ConnectionEvent::Snapshot {
            connection,
            snapshot: TradeSnapshot {
                symbol: format!("{}-USDT", base),
                last_traded_price: last,
                high,
            },
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_shards_across_connections() {
        let mut h = harness(3);
        h.coordinator
            .handle_universe(universe(&["A", "B", "C", "D", "E", "F", "G"]));

        assert_eq!(h.coordinator.pair_count(), 7);
        assert_eq!(h.coordinator.connection_count(), 3);
        assert_eq!(h.connector.opened(), 3);
        assert!(matches!(
            h.coordinator.pair("A").unwrap().subscription,
            SubscriptionState::Reserved { .. }
        ));

        let mut total = 0;
        for id in 1..=3 {
            let connection = open(&mut h, id);
            let sent = h.connector.sent(connection);
            assert!(sent.len() <= 3);
            assert!(sent.iter().all(|m| m.kind == OutboundKind::Subscribe));
            total += sent.len();
        }
        assert_eq!(total, 7);
        assert_eq!(h.coordinator.pending_requests(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacked_subscribe_is_resent_with_new_id() {
        let mut h = harness(10);
        h.coordinator.handle_universe(universe(&["BTC"]));
        let connection = open(&mut h, 1);
        let first = h.connector.sent(connection);
        assert_eq!(first.len(), 1);

        let event = h.inbox.timer_events.recv().await.unwrap();
        h.coordinator.handle_timer(event);

        let retry = h.connector.sent(connection);
        assert_eq!(retry.len(), 1);
        assert_ne!(retry[0].id, first[0].id);
        assert_eq!(retry[0].topic, first[0].topic);

        // A late ack for the replaced id settles the retry
        h.coordinator.handle_connection_event(ConnectionEvent::Ack {
            connection,
            request: RequestId::from_wire(&first[0].id).unwrap(),
        });
        assert_eq!(h.coordinator.pair("BTC").unwrap().connection(), Some(connection));
        assert_eq!(h.coordinator.pending_requests(), 0);

        // The ack for the retry itself is a duplicate
        h.coordinator.handle_connection_event(ConnectionEvent::Ack {
            connection,
            request: RequestId::from_wire(&retry[0].id).unwrap(),
        });
        assert_eq!(h.coordinator.pair("BTC").unwrap().connection(), Some(connection));
        assert_eq!(h.coordinator.pool.subscription_count(connection), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.inbox.timer_events.try_recv().is_err());
        assert!(h.connector.sent(connection).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_acks_still_subscribe() {
        let mut h = harness(10);
        h.coordinator.handle_universe(universe(&["BTC"]));
        let connection = open(&mut h, 1);
        let mut ids: Vec<RequestId> = h
            .connector
            .sent(connection)
            .iter()
            .filter_map(|m| RequestId::from_wire(&m.id))
            .collect();

        // Each ack lands just after the request it answers was replaced
        for _ in 0..4 {
            let event = h.inbox.timer_events.recv().await.unwrap();
            h.coordinator.handle_timer(event);
            let resent = h.connector.sent(connection);
            assert_eq!(resent.len(), 1);
            ids.push(RequestId::from_wire(&resent[0].id).unwrap());

            let previous = ids[ids.len() - 2];
            h.coordinator.handle_connection_event(ConnectionEvent::Ack {
                connection,
                request: previous,
            });
            if h.coordinator.pair("BTC").unwrap().connection().is_some() {
                break;
            }
        }

        assert_eq!(h.coordinator.pair("BTC").unwrap().connection(), Some(connection));
        assert_eq!(h.coordinator.pending_requests(), 0);

        // Remaining acks for any id of the request change nothing
        for request in ids {
            h.coordinator.handle_connection_event(ConnectionEvent::Ack { connection, request });
        }
        assert_eq!(h.coordinator.pool.subscription_count(connection), 1);
        assert_eq!(h.coordinator.pending_requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_on_other_connection_ignored() {
        let mut h = harness(10);
        h.coordinator.handle_universe(universe(&["BTC"]));
        let connection = open(&mut h, 1);
        let sent = h.connector.sent(connection);
        let request = RequestId::from_wire(&sent[0].id).unwrap();

        h.coordinator.handle_connection_event(ConnectionEvent::Ack {
            connection: ConnectionId::new(7),
            request,
        });
        assert!(matches!(
            h.coordinator.pair("BTC").unwrap().subscription,
            SubscriptionState::Subscribing { .. }
        ));
        assert_eq!(h.coordinator.pending_requests(), 1);

        h.coordinator.handle_connection_event(ConnectionEvent::Ack { connection, request });
        assert_eq!(h.coordinator.pair("BTC").unwrap().connection(), Some(connection));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_universe_sends_nothing() {
        let mut h = harness(10);
        h.coordinator.handle_universe(universe(&["BTC", "ETH"]));
        let connection = open(&mut h, 1);
        assert_eq!(ack_all(&mut h, connection), 2);

        h.coordinator.handle_universe(universe(&["BTC", "ETH"]));
        assert!(h.connector.sent(connection).is_empty());
        assert_eq!(h.connector.opened(), 1);
        assert_eq!(h.coordinator.pair_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_pair_dropped_after_unsubscribe_ack() {
        let mut h = harness(10);
        h.coordinator.handle_universe(universe(&["BTC", "ETH"]));
        let connection = open(&mut h, 1);
        ack_all(&mut h, connection);

        h.coordinator.handle_universe(universe(&["BTC", "SOL"]));
        let sent = h.connector.sent(connection);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].kind, OutboundKind::Unsubscribe);
        assert_eq!(sent[0].topic.as_deref(), Some("/market/snapshot:ETH-USDT"));
        assert_eq!(sent[1].kind, OutboundKind::Subscribe);
        assert!(matches!(
            h.coordinator.pair("ETH").unwrap().subscription,
            SubscriptionState::Unsubscribing { .. }
        ));

        for message in sent {
            let request = RequestId::from_wire(&message.id).unwrap();
            h.coordinator.handle_connection_event(ConnectionEvent::Ack { connection, request });
        }
        assert!(h.coordinator.pair("ETH").is_none());
        assert!(h.coordinator.pair("SOL").unwrap().connection().is_some());
        assert_eq!(h.coordinator.pool.subscription_count(connection), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_connection_regroups_pairs() {
        let mut h = harness(10);
        h.coordinator.handle_universe(universe(&["BTC", "ETH"]));
        let connection = open(&mut h, 1);
        ack_all(&mut h, connection);

        h.coordinator.handle_connection_event(ConnectionEvent::Closed {
            connection,
            reason: DisconnectReason::KeepaliveTimeout,
        });
        assert_eq!(h.connector.opened(), 2);
        assert_eq!(h.coordinator.connection_count(), 1);

        let replacement = open(&mut h, 2);
        assert_eq!(ack_all(&mut h, replacement), 2);
        assert_eq!(h.coordinator.pair("BTC").unwrap().connection(), Some(replacement));
        assert_eq!(h.coordinator.pair("ETH").unwrap().connection(), Some(replacement));

        // Late events from the dead connection are ignored
        tick(&mut h, connection, "BTC", dec!(100), dec!(100));
        assert_eq!(h.coordinator.pair("BTC").unwrap().strike.buy_target_price(), dec!(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_discards_everything() {
        let mut h = harness(1);
        h.coordinator.handle_universe(universe(&["BTC", "ETH"]));
        open(&mut h, 1);
        assert_eq!(h.coordinator.pending_requests(), 1);

        h.coordinator
            .handle_universe(UniverseUpdate::Failed("timeout".into()));
        assert_eq!(h.coordinator.pair_count(), 0);
        assert_eq!(h.coordinator.connection_count(), 0);
        assert_eq!(h.coordinator.pending_requests(), 0);

        // Cold restart opens fresh connections
        h.coordinator.handle_universe(universe(&["BTC"]));
        assert_eq!(h.connector.opened(), 3);
        assert_eq!(h.coordinator.connection_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signals_are_notified() {
        let mut h = harness(10);
        h.coordinator.handle_universe(universe(&["ABC"]));
        let connection = open(&mut h, 1);
        ack_all(&mut h, connection);

        tick(&mut h, connection, "ABC", dec!(100), dec!(100));
        tick(&mut h, connection, "ABC", dec!(105), dec!(105));
        tick(&mut h, connection, "ABC", dec!(110), dec!(110));
        tick(&mut h, connection, "ABC", dec!(70), dec!(110));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let sent = h.notifier.sent.lock().clone();
        assert_eq!(sent.len(), 2);
        let text = |channel| {
            sent.iter()
                .find(|(_, c)| *c == channel)
                .map(|(text, _)| text.clone())
                .unwrap()
        };
        let buy = text(NotificationChannel::Strike);
        assert!(buy.contains("<b>ABC-USDT</b>"));
        assert!(buy.contains("Strike count => 2"));
        assert!(text(NotificationChannel::ApeIn).contains("-36.36%"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_strike_reset_timer_returns_to_idle() {
        let mut h = harness(10);
        h.coordinator.handle_universe(universe(&["ABC"]));
        let connection = open(&mut h, 1);
        ack_all(&mut h, connection);

        tick(&mut h, connection, "ABC", dec!(100), dec!(100));
        tick(&mut h, connection, "ABC", dec!(105), dec!(105));
        assert_eq!(h.coordinator.pair("ABC").unwrap().strike.strike_count(), 1);

        let start = tokio::time::Instant::now();
        let event = h.inbox.timer_events.recv().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(15 * 60));

        // A stale copy of the event is ignored after the first reset
        h.coordinator.handle_timer(event.clone());
        h.coordinator.handle_timer(event);
        let pair = h.coordinator.pair("ABC").unwrap();
        assert_eq!(pair.strike.strike_count(), 0);
        assert_eq!(pair.strike.buy_target_price(), dec!(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ape_in_decay_restores_threshold_once() {
        let mut h = harness(10);
        h.coordinator.handle_universe(universe(&["ABC"]));
        let connection = open(&mut h, 1);
        ack_all(&mut h, connection);
        let start = h.coordinator.detectors.ape_in.start_percentage;

        tick(&mut h, connection, "ABC", dec!(70), dec!(100));
        let threshold = h.coordinator.pair("ABC").unwrap().ape_in.trigger_percentage();
        assert!(threshold > start);

        let armed = tokio::time::Instant::now();
        let event = h.inbox.timer_events.recv().await.unwrap();
        assert!(matches!(event, TimerEvent::ApeInDecay { ref base, .. } if base == "ABC"));
        assert!(armed.elapsed() >= Duration::from_secs(6 * 60 * 60));

        h.coordinator.handle_timer(event.clone());
        assert_eq!(h.coordinator.pair("ABC").unwrap().ape_in.trigger_percentage(), start);
        assert!(!h.coordinator.pair("ABC").unwrap().ape_in_timer.is_armed());

        // A new alert re-arms; the old firing must not undo it
        tick(&mut h, connection, "ABC", dec!(70), dec!(100));
        assert_eq!(h.coordinator.pair("ABC").unwrap().ape_in.trigger_percentage(), threshold);
        h.coordinator.handle_timer(event);
        let pair = h.coordinator.pair("ABC").unwrap();
        assert_eq!(pair.ape_in.trigger_percentage(), threshold);
        assert!(pair.ape_in_timer.is_armed());
    }
}
