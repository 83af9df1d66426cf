//! Output adapters for delivering notifications
//!
//! A [`Notifier`] performs one delivery attempt. The [`NotificationDispatcher`] wraps any
//! notifier with fire-and-forget semantics: every message is delivered on its own task and
//! retried after a fixed delay until it succeeds or the attempt budget runs out.

pub mod telegram;

pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};
use types::NotificationChannel;

use crate::config::NotificationRetryConfig;
use crate::Result;

/// Notification delivery trait
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the notifier type
    fn notifier_type(&self) -> &str;

    /// Deliver one message through the bot serving `channel`
    async fn send(&self, text: &str, channel: NotificationChannel) -> Result<()>;
}

/// Notifier that only logs; used when no bot credentials are configured
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn notifier_type(&self) -> &str {
        "log"
    }

    async fn send(&self, text: &str, channel: NotificationChannel) -> Result<()> {
        info!(channel = %channel, text = %text, "Notification");
        Ok(())
    }
}

/// Fire-and-forget front end with fixed-delay retries
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    retry: NotificationRetryConfig,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, retry: NotificationRetryConfig) -> Self {
        Self { notifier, retry }
    }

    /// Queue a message for delivery and return immediately
    pub fn dispatch(&self, text: String, channel: NotificationChannel) {
        let notifier = self.notifier.clone();
        let retry = self.retry.clone();
        tokio::spawn(async move {
            deliver(notifier.as_ref(), &retry, &text, channel).await;
        });
    }
}

/// Attempt delivery up to `retry.max_attempts` times; returns whether it succeeded
async fn deliver(
    notifier: &dyn Notifier,
    retry: &NotificationRetryConfig,
    text: &str,
    channel: NotificationChannel,
) -> bool {
    let max_attempts = retry.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match notifier.send(text, channel).await {
            Ok(()) => return true,
            Err(e) if attempt < max_attempts => {
                warn!(
                    notifier = notifier.notifier_type(),
                    channel = %channel,
                    attempt,
                    error = %e,
                    "Notification failed, retrying"
                );
                tokio::time::sleep(retry.retry_delay).await;
            }
            Err(e) => {
                error!(
                    notifier = notifier.notifier_type(),
                    channel = %channel,
                    attempts = max_attempts,
                    error = %e,
                    "Notification dropped"
                );
            }
        }
    }
    false
}
