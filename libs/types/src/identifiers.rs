//! # Typed Identifiers
//!
//! Zero-cost wrappers for the numeric identifiers that flow between the connection
//! pool, the acknowledgment tracker and the exchange.
//!
//! ```rust
//! use types::{ConnectionId, RequestId};
//!
//! let connection = ConnectionId::new(1);
//! let request = RequestId::new(1_700_000_000_000);
//!
//! // Distinct types: a request id can never be passed where a connection id is expected
//! assert_eq!(connection.to_string(), "1");
//! assert_eq!(request.as_wire(), "1700000000000");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_typed_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize
        )]
        #[repr(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new typed ID
            #[inline(always)]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Extract the inner value
            #[inline(always)]
            pub const fn inner(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

define_typed_id! {
    /// Identifier of one exchange WebSocket session, allocated by the connection pool
    /// and passed to the exchange as `connectId`
    ConnectionId
}

define_typed_id! {
    /// Identifier correlating an outbound subscribe/unsubscribe with its ack
    RequestId
}

impl RequestId {
    /// The exchange echoes ids back as strings
    pub fn as_wire(&self) -> String {
        self.0.to_string()
    }

    /// Parse an id echoed by the exchange
    pub fn from_wire(raw: &str) -> Option<Self> {
        raw.parse().ok().map(Self)
    }
}

/// Kind of subscription request awaiting acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Start receiving the instrument's topic
    Subscribe,
    /// Stop receiving the instrument's topic
    Unsubscribe,
}

impl RequestKind {
    /// Wire name used in the `type` field
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Subscribe => "subscribe",
            RequestKind::Unsubscribe => "unsubscribe",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
