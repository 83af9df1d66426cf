//! # Watcher Service - KuCoin Universe Watcher
//!
//! ## Purpose
//!
//! Tracks every KuCoin base asset that trades against a configured quote, keeps one
//! market snapshot subscription per base spread across as few WebSocket connections as the
//! exchange limits allow, and feeds each snapshot to the strike ladder and ape-in
//! detectors. Detector signals become Telegram notifications.
//!
//! ## Architecture Role
//!
//! ```text
//! Reconciler ──UniverseUpdate──▶ Coordinator ◀──ConnectionEvent── connection tasks
//!                                   │    ▲
//!                                   │    └──TimerEvent── ack retry / strike reset / ape-in decay
//!                                   ▼
//!                     route_snapshot ──Signal──▶ NotificationDispatcher
//! ```
//!
//! The [`Coordinator`] owns all mutable state. Everything else reaches it through
//! channels, so each event is handled to completion before the next one.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod pair;
pub mod reconciler;
pub mod router;
pub mod universe;

pub use config::WatcherConfig;
pub use coordinator::{Coordinator, CoordinatorInbox};
pub use error::{Result, WatcherError};
pub use pair::{SubscriptionState, TrackedPair};
pub use reconciler::{Reconciler, UniverseUpdate};
pub use router::{route_snapshot, TimerEvent};
pub use universe::{diff_universe, select_universe, UniverseDiff};
