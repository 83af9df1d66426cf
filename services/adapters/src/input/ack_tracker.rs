//! Acknowledgment tracking for subscribe/unsubscribe requests
//!
//! Every outbound request is registered under a fresh [`RequestId`] together with a retry
//! timer. The retry interval grows with the number of requests in flight
//! (`pacing interval * outstanding count`), since every queued message delays the ones
//! behind it by one pacing slot. An ack removes the entry and cancels its timer; an expired
//! timer hands the request back to the owner, who resends it under a new id. There is no
//! retry limit.
//!
//! A resent request keeps every id it replaced as an alias, so an ack that arrives for an
//! older id after the retry went out still resolves the live request, exactly once.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use types::{ConnectionId, RequestId, RequestKind};

use crate::timer::TimerSlot;

/// A request awaiting its ack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Base symbol of the tracked pair
    pub base: String,
    pub kind: RequestKind,
    pub connection: ConnectionId,
    pub topic: String,
}

/// A request whose retry timer fired, claimed for resending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredRequest {
    pub id: RequestId,
    pub request: PendingRequest,
    /// Ids replaced by earlier retries of the same request
    superseded: Vec<RequestId>,
}

#[derive(Debug)]
struct Entry {
    request: PendingRequest,
    timer: TimerSlot,
    superseded: Vec<RequestId>,
}

/// Correlates outbound requests with acks and owns their retry timers
///
/// Expiries are delivered on `expiries` as `on_expiry(request_id)`.
pub struct AckTracker<E> {
    pending: HashMap<RequestId, Entry>,
    /// Replaced id -> id of the live retry
    aliases: HashMap<RequestId, RequestId>,
    next_id: u64,
    pacing: Duration,
    expiries: mpsc::Sender<E>,
    on_expiry: fn(RequestId) -> E,
}

impl<E: Send + 'static> AckTracker<E> {
    pub fn new(pacing: Duration, expiries: mpsc::Sender<E>, on_expiry: fn(RequestId) -> E) -> Self {
        Self {
            pending: HashMap::new(),
            aliases: HashMap::new(),
            next_id: 1,
            pacing,
            expiries,
            on_expiry,
        }
    }

    /// Register a request under a new id and start its retry timer
    pub fn track(&mut self, request: PendingRequest) -> RequestId {
        let id = RequestId::new(self.next_id);
        self.next_id += 1;

        let retry_after = self.pacing * (self.pending.len() as u32 + 1);
        let mut timer = TimerSlot::new();
        let on_expiry = self.on_expiry;
        timer.arm(&self.expiries, retry_after, move |_| on_expiry(id));

        debug!(
            request = %id,
            kind = %request.kind,
            base = %request.base,
            connection = %request.connection,
            retry_ms = retry_after.as_millis() as u64,
            "Tracking request"
        );
        self.pending.insert(
            id,
            Entry {
                request,
                timer,
                superseded: Vec::new(),
            },
        );
        id
    }

    /// Resend an expired request under a new id, keeping the old ids as aliases
    pub fn retry(&mut self, expired: ExpiredRequest) -> RequestId {
        let ExpiredRequest {
            id: expired_id,
            request,
            mut superseded,
        } = expired;
        superseded.push(expired_id);

        let id = self.track(request);
        for old in &superseded {
            self.aliases.insert(*old, id);
        }
        if let Some(entry) = self.pending.get_mut(&id) {
            entry.superseded = superseded;
        }
        id
    }

    /// Id of the live request `id` refers to, following retries
    fn live_id(&self, id: RequestId) -> RequestId {
        self.aliases.get(&id).copied().unwrap_or(id)
    }

    /// Resolve an ack for `id` or any id it replaced
    ///
    /// Returns the live id with its request; `None` for ids that are unknown or already
    /// resolved.
    pub fn ack(&mut self, id: RequestId) -> Option<(RequestId, PendingRequest)> {
        let live = self.live_id(id);
        let mut entry = self.pending.remove(&live)?;
        entry.timer.cancel();
        for old in &entry.superseded {
            self.aliases.remove(old);
        }
        if live != id {
            debug!(request = %id, live = %live, "Ack for replaced request id");
        }
        Some((live, entry.request))
    }

    /// Claim a request whose retry timer fired; `None` if it was acked meanwhile
    ///
    /// The aliases of the request are released here and only come back through
    /// [`retry`](Self::retry).
    pub fn expire(&mut self, id: RequestId) -> Option<ExpiredRequest> {
        let entry = self.pending.remove(&id)?;
        for old in &entry.superseded {
            self.aliases.remove(old);
        }
        Some(ExpiredRequest {
            id,
            request: entry.request,
            superseded: entry.superseded,
        })
    }

    /// Drop every request sent on `connection`, cancelling their timers
    pub fn cancel_connection(&mut self, connection: ConnectionId) -> Vec<PendingRequest> {
        let ids: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.request.connection == connection)
            .map(|(id, _)| *id)
            .collect();

        ids.into_iter()
            .filter_map(|id| self.ack(id))
            .map(|(_, request)| request)
            .collect()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        for (_, mut entry) in self.pending.drain() {
            entry.timer.cancel();
        }
        self.aliases.clear();
    }

    /// Request `id` belongs to, following retries
    pub fn get(&self, id: RequestId) -> Option<&PendingRequest> {
        self.pending.get(&self.live_id(id)).map(|entry| &entry.request)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(base: &str, connection: u64) -> PendingRequest {
        PendingRequest {
            base: base.to_string(),
            kind: RequestKind::Subscribe,
            connection: ConnectionId::new(connection),
            topic: format!("/market/snapshot:{}-USDT", base),
        }
    }

    fn tracker() -> (AckTracker<RequestId>, mpsc::Receiver<RequestId>) {
        let (tx, rx) = mpsc::channel(16);
        (AckTracker::new(Duration::from_millis(100), tx, |id| id), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_cancels_retry() {
        let (mut tracker, mut rx) = tracker();
        let id = tracker.track(request("BTC", 1));

        assert_eq!(tracker.ack(id), Some((id, request("BTC", 1))));
        assert!(tracker.is_empty());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
        // Late duplicate ack
        assert_eq!(tracker.ack(id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_interval_scales_with_outstanding() {
        let (mut tracker, mut rx) = tracker();
        let start = tokio::time::Instant::now();

        let first = tracker.track(request("BTC", 1));
        let second = tracker.track(request("ETH", 1));
        assert_ne!(first, second);

        assert_eq!(rx.recv().await, Some(first));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100) && elapsed < Duration::from_millis(200));
        assert_eq!(rx.recv().await, Some(second));
        assert!(start.elapsed() >= Duration::from_millis(200));

        let expired = tracker.expire(first).unwrap();
        assert_eq!(expired.id, first);
        assert_eq!(expired.request, request("BTC", 1));
        assert_eq!(tracker.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_after_ack_is_stale() {
        let (mut tracker, _rx) = tracker();
        let id = tracker.track(request("BTC", 1));
        tracker.ack(id);
        assert_eq!(tracker.expire(id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_connection() {
        let (mut tracker, mut rx) = tracker();
        tracker.track(request("BTC", 1));
        tracker.track(request("ETH", 2));
        tracker.track(request("XRP", 1));

        let mut cancelled: Vec<String> = tracker
            .cancel_connection(ConnectionId::new(1))
            .into_iter()
            .map(|request| request.base)
            .collect();
        cancelled.sort();
        assert_eq!(cancelled, vec!["BTC", "XRP"]);
        assert_eq!(tracker.len(), 1);

        // Only the surviving request's timer fires
        let fired = rx.recv().await.unwrap();
        assert_eq!(tracker.get(fired).map(|r| r.base.as_str()), Some("ETH"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_for_replaced_id_resolves_retry() {
        let (mut tracker, mut rx) = tracker();
        let first = tracker.track(request("BTC", 1));

        let mut live = first;
        for _ in 0..3 {
            assert_eq!(rx.recv().await, Some(live));
            let expired = tracker.expire(live).unwrap();
            live = tracker.retry(expired);
        }
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get(first).map(|r| r.base.as_str()), Some("BTC"));

        // The oldest id settles the live retry and every other alias goes with it
        assert_eq!(tracker.ack(first), Some((live, request("BTC", 1))));
        assert!(tracker.is_empty());
        assert_eq!(tracker.ack(live), None);
        assert_eq!(tracker.ack(RequestId::new(2)), None);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_request_not_retried_drops_aliases() {
        let (mut tracker, mut rx) = tracker();
        let first = tracker.track(request("BTC", 1));
        assert_eq!(rx.recv().await, Some(first));
        let expired = tracker.expire(first).unwrap();
        let second = tracker.retry(expired);

        assert_eq!(rx.recv().await, Some(second));
        tracker.expire(second).unwrap();
        assert_eq!(tracker.ack(first), None);
        assert_eq!(tracker.get(first), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_forgets_aliases() {
        let (mut tracker, mut rx) = tracker();
        let first = tracker.track(request("BTC", 1));
        assert_eq!(rx.recv().await, Some(first));
        let expired = tracker.expire(first).unwrap();
        tracker.retry(expired);

        tracker.clear();
        assert!(tracker.is_empty());
        assert_eq!(tracker.ack(first), None);
    }
}
