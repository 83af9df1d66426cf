//! KuCoin WebSocket wire format
//!
//! Outbound frames are `{id, type, topic?, response?}` JSON objects. Inbound frames are
//! tagged by `type`; anything that does not parse as one of the known shapes is a
//! protocol desync and terminates the connection.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use types::{RequestId, RequestKind, TradeSnapshot};

use crate::{AdapterError, Result};

/// Subject carried by market snapshot pushes
pub const SNAPSHOT_SUBJECT: &str = "trade.snapshot";

/// Client message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundKind {
    Subscribe,
    Unsubscribe,
    Ping,
}

/// Client-to-server frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OutboundKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<bool>,
}

impl OutboundMessage {
    /// Subscribe/unsubscribe request that asks the server for an ack
    pub fn request(id: RequestId, kind: RequestKind, topic: impl Into<String>) -> Self {
        let kind = match kind {
            RequestKind::Subscribe => OutboundKind::Subscribe,
            RequestKind::Unsubscribe => OutboundKind::Unsubscribe,
        };
        Self {
            id: id.as_wire(),
            kind,
            topic: Some(topic.into()),
            response: Some(true),
        }
    }

    /// Keepalive ping
    pub fn ping(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: OutboundKind::Ping,
            topic: None,
            response: None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Server-to-client frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    Welcome {
        #[serde(default)]
        id: Option<String>,
    },
    Ack {
        id: String,
    },
    Pong {
        #[serde(default)]
        id: Option<String>,
    },
    Message {
        topic: String,
        #[serde(default)]
        subject: Option<String>,
        #[serde(default)]
        data: Value,
    },
    Error {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        code: Option<Value>,
        #[serde(default)]
        data: Option<Value>,
    },
}

impl InboundMessage {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| AdapterError::ProtocolDesync(format!("{}: {}", e, truncate(text, 200))))
    }
}

/// Extract the snapshot carried by a `trade.snapshot` push (`data.data.{...}`)
pub fn parse_snapshot(data: &Value) -> Result<TradeSnapshot> {
    let inner = data.get("data").ok_or_else(|| AdapterError::MissingField {
        field: "data.data".to_string(),
    })?;

    let symbol = inner
        .get("symbol")
        .and_then(Value::as_str)
        .ok_or_else(|| AdapterError::MissingField {
            field: "data.data.symbol".to_string(),
        })?
        .to_string();

    Ok(TradeSnapshot {
        symbol,
        last_traded_price: decimal_field(inner, "lastTradedPrice")?,
        high: decimal_field(inner, "high")?,
    })
}

/// Read a price that KuCoin may send as a JSON number or a string
fn decimal_field(object: &Value, field: &str) -> Result<Decimal> {
    let raw = match object.get(field) {
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => {
            return Err(AdapterError::MissingField {
                field: field.to_string(),
            })
        }
        Some(other) => {
            return Err(AdapterError::InvalidNumeric {
                value: other.to_string(),
            })
        }
    };

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| AdapterError::InvalidNumeric { value: raw })
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
