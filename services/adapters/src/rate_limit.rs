//! Outbound message pacing
//!
//! KuCoin caps client messages per connection per second. Every subscribe, unsubscribe
//! and ping leaves a connection through a [`MessagePacer`] that spaces messages at least
//! `1s / max_messages_per_second` apart. The same interval seeds the acknowledgment
//! retry timers.

use governor::{DefaultDirectRateLimiter, Quota};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::{AdapterError, Result};

/// Minimum spacing between two outbound messages on one connection
pub fn pacing_interval(max_messages_per_second: NonZeroU32) -> Duration {
    Duration::from_secs(1) / max_messages_per_second.get()
}

/// Per-connection outbound rate limiter
pub struct MessagePacer {
    limiter: DefaultDirectRateLimiter,
    interval: Duration,
}

impl MessagePacer {
    /// Create a pacer allowing one message per pacing interval, no bursts
    pub fn new(max_messages_per_second: NonZeroU32) -> Result<Self> {
        let interval = pacing_interval(max_messages_per_second);
        let quota = Quota::with_period(interval)
            .ok_or_else(|| {
                AdapterError::Configuration(format!(
                    "Invalid pacing interval {:?} for {} messages/s",
                    interval, max_messages_per_second
                ))
            })?
            .allow_burst(nonzero!(1u32));

        Ok(Self {
            limiter: DefaultDirectRateLimiter::direct(quota),
            interval,
        })
    }

    /// Configured spacing
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next message may be sent
    pub async fn until_ready(&self) {
        self.limiter.until_ready().await;
    }
}
