//! Periodic instrument list fetcher
//!
//! Fetches the full instrument list once at startup and then on a fixed interval, handing
//! every result to the coordinator. A failed fetch is reported as [`UniverseUpdate::Failed`]
//! so the coordinator can discard its state, and the next attempt follows after the
//! restart delay.

use kucoin_adapter::ExchangeApi;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use types::Instrument;

/// Message from the reconciler to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum UniverseUpdate {
    /// Full instrument list
    Snapshot(Vec<Instrument>),
    /// The fetch failed; all state must be discarded
    Failed(String),
}

pub struct Reconciler {
    api: Arc<dyn ExchangeApi>,
    refresh_interval: Duration,
    restart_delay: Duration,
}

impl Reconciler {
    pub fn new(api: Arc<dyn ExchangeApi>, refresh_interval: Duration, restart_delay: Duration) -> Self {
        Self {
            api,
            refresh_interval,
            restart_delay,
        }
    }

    /// Run until the coordinator stops listening
    pub async fn run(self, updates: mpsc::Sender<UniverseUpdate>) {
        info!(
            refresh_secs = self.refresh_interval.as_secs(),
            "Universe reconciler started"
        );

        loop {
            let (update, wait) = match self.api.symbols().await {
                Ok(instruments) => {
                    debug!(count = instruments.len(), "Fetched instrument list");
                    (UniverseUpdate::Snapshot(instruments), self.refresh_interval)
                }
                Err(e) => {
                    if e.is_recoverable() {
                        warn!(error = %e, "Instrument list fetch failed");
                    } else {
                        error!(error = %e, "Instrument list fetch failed, will retry after restart delay");
                    }
                    (UniverseUpdate::Failed(e.to_string()), self.restart_delay)
                }
            };

            if updates.send(update).await.is_err() {
                break;
            }
            tokio::time::sleep(wait).await;
        }

        info!("Universe reconciler stopped");
    }
}
