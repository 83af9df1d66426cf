//! Error types for the KuCoin adapter

use thiserror::Error;
use types::ConnectionId;

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Main error type for adapter operations
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Connection-related errors
    #[error("Connection {connection} failed: {reason}")]
    ConnectionFailed {
        /// The connection that failed
        connection: ConnectionId,
        /// Reason for the failure
        reason: String,
    },

    /// Connection timeout during connect or welcome handshake
    #[error("Connection {connection} timed out after {timeout_ms}ms")]
    ConnectionTimeout {
        /// The connection that timed out
        connection: ConnectionId,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Connection closed before the operation could complete
    #[error("Connection {connection} closed: {reason:?}")]
    ConnectionClosed {
        /// The connection that was closed
        connection: ConnectionId,
        /// Optional reason for closure
        reason: Option<String>,
    },

    /// Exchange API answered with a non-success code
    #[error("Exchange API error {code}: {message}")]
    Api {
        /// Code returned by the exchange
        code: String,
        /// Message returned by the exchange, if any
        message: String,
    },

    /// Unexpected or malformed message on an established stream
    #[error("Protocol desync: {0}")]
    ProtocolDesync(String),

    /// JSON parsing error from exchange response
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Required field missing from exchange message
    #[error("Missing required field: {field}")]
    MissingField {
        /// The field that was missing
        field: String,
    },

    /// Invalid numeric value in exchange data
    #[error("Invalid numeric value: {value}")]
    InvalidNumeric {
        /// The value that couldn't be parsed
        value: String,
    },

    /// System errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed endpoint URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error in adapter settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Notification could not be delivered
    #[error("Notification failed after {attempts} attempt(s): {reason}")]
    NotificationFailed {
        /// Attempts made before giving up
        attempts: u32,
        /// Last failure
        reason: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AdapterError {
    /// Check if this error is recoverable through retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AdapterError::ConnectionFailed { .. }
                | AdapterError::ConnectionTimeout { .. }
                | AdapterError::ConnectionClosed { .. }
                | AdapterError::Api { .. }
                | AdapterError::ProtocolDesync(_)
                | AdapterError::JsonParse(_)
                | AdapterError::WebSocket(_)
                | AdapterError::Http(_)
                | AdapterError::NotificationFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let timeout = AdapterError::ConnectionTimeout {
            connection: ConnectionId::new(3),
            timeout_ms: 10_000,
        };
        assert!(timeout.is_recoverable());

        let config = AdapterError::Configuration("max messages per second is zero".into());
        assert!(!config.is_recoverable());
        let malformed = AdapterError::MissingField {
            field: "instanceServers".into(),
        };
        assert!(!malformed.is_recoverable());
    }

    #[test]
    fn test_api_error_display() {
        let err = AdapterError::Api {
            code: "400100".into(),
            message: "Invalid request".into(),
        };
        assert_eq!(err.to_string(), "Exchange API error 400100: Invalid request");
    }
}
