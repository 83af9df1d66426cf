//! Notification texts produced by the detectors
//!
//! Messages are Telegram HTML: pair names and prices are wrapped in `<b>` tags and
//! emoji are written as HTML entities.

use rust_decimal::Decimal;
use types::NotificationChannel;

use crate::ape_in::ApeInSignal;
use crate::strike::BuySignal;

/// A detector signal bound to its instrument, ready to render
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Strike ladder buy signal
    Buy {
        symbol: String,
        quote: String,
        signal: BuySignal,
    },
    /// Drop-from-high alert
    ApeIn { symbol: String, signal: ApeInSignal },
}

impl Signal {
    /// Bot the message is sent through
    pub fn channel(&self) -> NotificationChannel {
        match self {
            Signal::Buy { .. } => NotificationChannel::Strike,
            Signal::ApeIn { .. } => NotificationChannel::ApeIn,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Signal::Buy { symbol, .. } | Signal::ApeIn { symbol, .. } => symbol,
        }
    }

    /// Render the HTML message greeting `user_name`
    pub fn render(&self, user_name: &str) -> String {
        match self {
            Signal::Buy {
                symbol,
                quote,
                signal,
            } => format!(
                "{user_name}, Checkout this trading pair => <b>{}</b> currently at price <b>{} {}</b>. \
                 It could be PUMPING!!! Strike count => {}. Percentage increase => {}%",
                symbol.to_uppercase(),
                format_price(signal.price),
                quote,
                signal.strike_count,
                signal.percentage_increase.normalize(),
            ),
            Signal::ApeIn { symbol, signal } => format!(
                "&#128161; <b>KUCOIN</b>\n\nHello {user_name}\nCheckout <b>{symbol}</b> currently \
                 with percentage change: <b>{}%</b> in the last 24hrs",
                signal.percent_change.normalize(),
            ),
        }
    }
}

/// Startup greeting sent on the service channel
pub fn service_starting(user_name: &str) -> String {
    format!("Hello {user_name}. Notification service is starting...")
}

/// Format a price with comma thousands separators and no trailing zeros
fn format_price(price: Decimal) -> String {
    let text = price.normalize().abs().to_string();
    let (integer, fraction) = match text.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(text.len() + integer.len() / 3 + 1);
    if price.is_sign_negative() && !price.is_zero() {
        grouped.push('-');
    }
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}
