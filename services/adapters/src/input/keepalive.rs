//! Per-connection keepalive monitor
//!
//! The server dictates the ping interval and pong timeout in the token response. The
//! connection task asks the monitor for a ping every interval; the first unanswered ping
//! arms a deadline that only a pong echoing its id clears. Past the deadline the
//! connection is considered dead.

use std::time::Duration;
use tokio::time::Instant;

use super::protocol::OutboundMessage;

#[derive(Debug)]
pub struct KeepaliveMonitor {
    interval: Duration,
    timeout: Duration,
    outstanding: Option<(String, Instant)>,
}

impl KeepaliveMonitor {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            outstanding: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the next ping and arm the pong deadline if none is running
    pub fn ping(&mut self, id: String, now: Instant) -> OutboundMessage {
        if self.outstanding.is_none() {
            self.outstanding = Some((id.clone(), now + self.timeout));
        }
        OutboundMessage::ping(id)
    }

    /// Record a pong; returns `true` when it answered the outstanding ping
    pub fn on_pong(&mut self, id: Option<&str>) -> bool {
        match (&self.outstanding, id) {
            (Some((expected, _)), Some(id)) if expected == id => {
                self.outstanding = None;
                true
            }
            _ => false,
        }
    }

    /// Instant at which the connection is declared dead, if a ping is unanswered
    pub fn deadline(&self) -> Option<Instant> {
        self.outstanding.as_ref().map(|(_, deadline)| *deadline)
    }
}
