//! Configuration for the KuCoin adapter
//!
//! Plain structs with defaults matching KuCoin's published public-feed limits. The watcher
//! service fills them from the environment and calls `validate()` before use.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::{AdapterError, Result};

/// REST endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Base URL, e.g. `https://api.kucoin.com`
    pub base_url: String,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.kucoin.com".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl RestConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AdapterError::Configuration(format!(
                "REST base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }
}

/// WebSocket connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Outbound message cap per connection
    pub max_messages_per_second: u32,

    /// Subscription cap per connection
    pub max_subscriptions_per_connection: usize,

    /// Bound on the socket connect and on waiting for the welcome message
    pub connect_timeout: Duration,

    /// Token requests attempted before the connection reports closed
    pub token_attempts: u32,

    /// Delay between token attempts
    pub token_retry_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_messages_per_second: 9,
            max_subscriptions_per_connection: 300,
            connect_timeout: Duration::from_secs(10),
            token_attempts: 3,
            token_retry_delay: Duration::from_secs(1),
        }
    }
}

impl ConnectionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_messages_per_second == 0 {
            return Err(AdapterError::Configuration(
                "Max messages per second must be greater than 0".to_string(),
            ));
        }
        if self.max_subscriptions_per_connection == 0 {
            return Err(AdapterError::Configuration(
                "Max subscriptions per connection must be greater than 0".to_string(),
            ));
        }
        if self.token_attempts == 0 {
            return Err(AdapterError::Configuration(
                "Token attempts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Message rate as a non-zero quota
    pub fn message_rate(&self) -> Result<NonZeroU32> {
        NonZeroU32::new(self.max_messages_per_second).ok_or_else(|| {
            AdapterError::Configuration("Max messages per second must be greater than 0".into())
        })
    }
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL
    pub api_url: String,

    /// Destination chat
    pub chat_id: String,

    /// Token of the bot sending service and strike messages
    pub bot_token: String,

    /// Token of the bot sending ape-in alerts
    pub ape_in_bot_token: String,
}

impl TelegramConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chat_id.is_empty() {
            return Err(AdapterError::Configuration("Telegram chat id is empty".into()));
        }
        if self.bot_token.is_empty() || self.ape_in_bot_token.is_empty() {
            return Err(AdapterError::Configuration("Telegram bot token is empty".into()));
        }
        Ok(())
    }
}

/// Retry policy for outbound notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRetryConfig {
    /// Attempts per message, including the first
    pub max_attempts: u32,

    /// Delay between attempts
    pub retry_delay: Duration,
}

impl Default for NotificationRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RestConfig::default().validate().is_ok());
        assert!(ConnectionConfig::default().validate().is_ok());
        assert_eq!(ConnectionConfig::default().message_rate().unwrap().get(), 9);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let config = ConnectionConfig {
            max_messages_per_second: 0,
            ..ConnectionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AdapterError::Configuration(_))
        ));
        assert!(config.message_rate().is_err());

        let config = ConnectionConfig {
            max_subscriptions_per_connection: 0,
            ..ConnectionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rest_url_scheme() {
        let config = RestConfig {
            base_url: "api.kucoin.com".into(),
            ..RestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_telegram_requires_credentials() {
        let config = TelegramConfig {
            api_url: "https://api.telegram.org".into(),
            chat_id: "42".into(),
            bot_token: String::new(),
            ape_in_bot_token: "token".into(),
        };
        assert!(config.validate().is_err());
    }
}
