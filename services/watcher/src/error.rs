//! Watcher service errors

use kucoin_adapter::AdapterError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatcherError>;

#[derive(Debug, Error)]
pub enum WatcherError {
    /// Environment variable holds an unusable value
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidConfig {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl WatcherError {
    pub(crate) fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        WatcherError::InvalidConfig {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }
}
