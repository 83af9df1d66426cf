//! KuCoin watcher service binary

use anyhow::Result;
use kucoin_adapter::{
    KucoinConnector, KucoinRestClient, LogNotifier, NotificationDispatcher, Notifier,
    TelegramNotifier,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use types::NotificationChannel;
use watcher_service::{Coordinator, Reconciler, WatcherConfig};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("watcher_service=info".parse()?)
                .add_directive("kucoin_adapter=info".parse()?)
                .add_directive("strategies=info".parse()?),
        )
        .init();

    info!("Starting KuCoin watcher");
    let config = WatcherConfig::from_env()?;

    let api = Arc::new(KucoinRestClient::new(&config.rest)?);
    let connector = Arc::new(KucoinConnector::new(api.clone(), config.connection.clone())?);

    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(telegram) => Arc::new(TelegramNotifier::new(telegram.clone())?),
        None => {
            warn!("Telegram credentials not configured, notifications are only logged");
            Arc::new(LogNotifier)
        }
    };
    let dispatcher = NotificationDispatcher::new(notifier, config.notification_retry.clone());
    dispatcher.dispatch(
        strategies::service_starting(&config.user_name),
        NotificationChannel::Service,
    );

    let (coordinator, inbox) = Coordinator::new(&config, connector, dispatcher)?;
    let (universe_tx, universe_rx) = mpsc::channel(4);
    let reconciler = Reconciler::new(api, config.refresh_interval, config.restart_delay);

    let reconciler = tokio::spawn(reconciler.run(universe_tx));
    let mut coordinator = tokio::spawn(coordinator.run(inbox, universe_rx));

    info!(
        quotes = ?config.quote_assets,
        max_subscriptions = config.connection.max_subscriptions_per_connection,
        "KuCoin watcher running, press Ctrl+C to stop"
    );

    tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received");
        }
        result = &mut coordinator => {
            warn!(?result, "Coordinator exited unexpectedly");
            return Ok(());
        }
    }

    // Dropping the reconciler's sender ends the coordinator loop
    reconciler.abort();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, coordinator).await.is_err() {
        warn!("Coordinator did not stop in time");
    }

    info!("KuCoin watcher stopped");
    Ok(())
}
