//! Telegram Bot API notifier

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use types::NotificationChannel;

use super::Notifier;
use crate::config::TelegramConfig;
use crate::{AdapterError, Result};

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends HTML messages through two bots: service/strike and ape-in
pub struct TelegramNotifier {
    client: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }

    fn token(&self, channel: NotificationChannel) -> &str {
        match channel {
            NotificationChannel::Service | NotificationChannel::Strike => &self.config.bot_token,
            NotificationChannel::ApeIn => &self.config.ape_in_bot_token,
        }
    }

    /// `sendMessage` URL; tokens are accepted with or without the `bot` prefix
    fn send_message_url(&self, channel: NotificationChannel) -> String {
        let token = self.token(channel);
        let prefix = if token.starts_with("bot") { "" } else { "bot" };
        format!(
            "{}/{}{}/sendMessage",
            self.config.api_url.trim_end_matches('/'),
            prefix,
            token
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn notifier_type(&self) -> &str {
        "telegram"
    }

    async fn send(&self, text: &str, channel: NotificationChannel) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.config.chat_id,
            text,
            parse_mode: "HTML",
        };

        let response = self
            .client
            .post(self.send_message_url(channel))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let reply: Option<BotResponse> = response.json().await.ok();
        match reply {
            Some(BotResponse { ok: true, .. }) if status.is_success() => {
                debug!(channel = %channel, "Notification delivered");
                Ok(())
            }
            reply => Err(AdapterError::NotificationFailed {
                attempts: 1,
                reason: reply
                    .and_then(|r| r.description)
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            }),
        }
    }
}
