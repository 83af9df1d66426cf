//! Notification routing shared by detectors and output adapters

use serde::{Deserialize, Serialize};
use std::fmt;

/// Destination bot for an outbound notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationChannel {
    /// Service lifecycle messages
    Service,
    /// Strike ladder buy signals
    Strike,
    /// Ape-in drop alerts
    ApeIn,
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationChannel::Service => "service",
            NotificationChannel::Strike => "strike",
            NotificationChannel::ApeIn => "ape-in",
        };
        f.write_str(name)
    }
}
