//! Watcher configuration
//!
//! Every setting comes from an environment variable with a default. `main` loads a `.env`
//! file through `dotenvy` first, so either source works.

use kucoin_adapter::{ConnectionConfig, NotificationRetryConfig, RestConfig, TelegramConfig};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use strategies::{ApeInConfig, DetectorConfig, StrikeConfig};

use crate::error::{Result, WatcherError};

/// Complete watcher configuration
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub rest: RestConfig,
    pub connection: ConnectionConfig,

    /// Quote assets in preference order
    pub quote_assets: Vec<String>,

    /// Separator between base and quote in exchange symbols
    pub symbol_separator: char,

    /// Time between two instrument list fetches
    pub refresh_interval: Duration,

    /// Wait before retrying after a failed fetch
    pub restart_delay: Duration,

    pub detectors: DetectorConfig,

    /// `None` when bot credentials are absent; notifications are then only logged
    pub telegram: Option<TelegramConfig>,
    pub notification_retry: NotificationRetryConfig,

    /// Name used in message greetings
    pub user_name: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            rest: RestConfig::default(),
            connection: ConnectionConfig::default(),
            quote_assets: vec!["USDT".to_string()],
            symbol_separator: '-',
            refresh_interval: Duration::from_secs(5 * 60),
            restart_delay: Duration::from_secs(5),
            detectors: DetectorConfig::default(),
            telegram: None,
            notification_retry: NotificationRetryConfig::default(),
            user_name: "trader".to_string(),
        }
    }
}

impl WatcherConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let quote_assets = match get("KUCOIN_QUOTE_ASSETS") {
            Some(raw) => raw
                .split(',')
                .map(|quote| quote.trim().to_string())
                .filter(|quote| !quote.is_empty())
                .collect(),
            None => defaults.quote_assets.clone(),
        };
        if quote_assets.is_empty() {
            return Err(WatcherError::invalid(
                "KUCOIN_QUOTE_ASSETS",
                "",
                "at least one quote asset is required",
            ));
        }

        let symbol_separator = match get("KUCOIN_SYMBOL_CURRENCIES_SPLIT_CHARACTER") {
            Some(raw) => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(separator), None) => separator,
                    _ => {
                        return Err(WatcherError::invalid(
                            "KUCOIN_SYMBOL_CURRENCIES_SPLIT_CHARACTER",
                            raw,
                            "expected a single character",
                        ))
                    }
                }
            }
            None => defaults.symbol_separator,
        };

        let connection = ConnectionConfig {
            max_messages_per_second: parse(
                &get,
                "KUCOIN_WEB_SOCKET_CONNECTION_MESSAGES_PER_SECOND_MAX_COUNT",
                defaults.connection.max_messages_per_second,
            )?,
            max_subscriptions_per_connection: parse(
                &get,
                "KUCOIN_WEB_SOCKET_CONNECTION_SUBSCRIPTION_TOPICS_MAX_COUNT",
                defaults.connection.max_subscriptions_per_connection,
            )?,
            ..defaults.connection.clone()
        };
        connection.validate()?;

        let rest = RestConfig {
            base_url: get("KUCOIN_REST_BASE_URL").unwrap_or(defaults.rest.base_url.clone()),
            ..defaults.rest.clone()
        };
        rest.validate()?;

        let refresh_minutes: u64 = parse(&get, "KUCOIN_SYMBOL_UPDATE_INTERVAL_MINS", 5)?;
        if refresh_minutes == 0 {
            return Err(WatcherError::invalid(
                "KUCOIN_SYMBOL_UPDATE_INTERVAL_MINS",
                "0",
                "must be greater than 0",
            ));
        }

        let strike = StrikeConfig {
            unit_percent: parse(
                &get,
                "KUCOIN_NOTIFICATIONS_STRIKE_UNIT_PERCENT",
                defaults.detectors.strike.unit_percent,
            )?,
            timeout_per_strike: minutes(parse(&get, "KUCOIN_NOTIFICATIONS_STRIKE_TIMEOUT_MINS", 15)?),
        };
        if strike.unit_percent <= Decimal::ZERO {
            return Err(WatcherError::invalid(
                "KUCOIN_NOTIFICATIONS_STRIKE_UNIT_PERCENT",
                strike.unit_percent.to_string(),
                "must be positive",
            ));
        }

        let ape_in = ApeInConfig {
            start_percentage: parse(
                &get,
                "APE_IN_START_PERCENTAGE",
                defaults.detectors.ape_in.start_percentage,
            )?,
            increment_percentage: parse(
                &get,
                "APE_IN_INCREMENT_PERCENTAGE",
                defaults.detectors.ape_in.increment_percentage,
            )?,
            decay: hours(parse(&get, "APE_IN_PERCENT_TIMEOUT_HRS", 6)?),
        };
        if ape_in.start_percentage >= Decimal::ZERO {
            return Err(WatcherError::invalid(
                "APE_IN_START_PERCENTAGE",
                ape_in.start_percentage.to_string(),
                "must be negative",
            ));
        }
        if ape_in.increment_percentage < Decimal::ZERO {
            return Err(WatcherError::invalid(
                "APE_IN_INCREMENT_PERCENTAGE",
                ape_in.increment_percentage.to_string(),
                "must not be negative",
            ));
        }

        let telegram = match (get("TELEGRAM_BOT_CHAT_ID"), get("TELEGRAM_BOT_TOKEN_SECRET")) {
            (Some(chat_id), Some(bot_token)) => {
                let telegram = TelegramConfig {
                    api_url: get("TELEGRAM_API_URL")
                        .unwrap_or_else(|| "https://api.telegram.org".to_string()),
                    chat_id,
                    ape_in_bot_token: get("TELEGRAM_APE_IN_BOT_TOKEN_SECRET")
                        .unwrap_or_else(|| bot_token.clone()),
                    bot_token,
                };
                telegram.validate()?;
                Some(telegram)
            }
            _ => None,
        };

        Ok(Self {
            rest,
            connection,
            quote_assets,
            symbol_separator,
            refresh_interval: minutes(refresh_minutes),
            restart_delay: defaults.restart_delay,
            detectors: DetectorConfig { strike, ape_in },
            telegram,
            notification_retry: defaults.notification_retry,
            user_name: get("USER_NAME").unwrap_or(defaults.user_name),
        })
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| WatcherError::invalid(key, raw.clone(), e.to_string())),
        None => Ok(default),
    }
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value * 60)
}

fn hours(value: u64) -> Duration {
    Duration::from_secs(value * 60 * 60)
}
