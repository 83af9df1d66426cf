//! # KuCoin Adapter - Public Market Feed Plumbing
//!
//! ## Purpose
//!
//! Everything the watcher needs to talk to KuCoin and to the outside world: the REST
//! collaborator for session tokens and the instrument list, the WebSocket wire protocol,
//! per-connection tasks with pacing and keepalive, the connection pool that shards
//! subscriptions across connections, the acknowledgment tracker with its retry timers,
//! and the Telegram notification output.
//!
//! ## Integration Points
//!
//! - **Input Sources**: `GET /api/v1/symbols`, `POST /api/v1/bullet-public`, WebSocket
//!   `/market/snapshot:{symbol}` pushes
//! - **Output Destinations**: Telegram `sendMessage` through two bots
//! - **Owner**: a single coordinating task in the watcher service holds the
//!   [`ConnectionPool`] and [`AckTracker`] and consumes [`ConnectionEvent`]s
//!
//! ## Architecture Role
//!
//! ```text
//! ┌──────────────┐   ConnectionEvent   ┌───────────────┐
//! │ Connection   │ ──────────────────▶ │  Coordinator  │
//! │ tasks (N)    │ ◀────────────────── │ (watcher)     │
//! └──────────────┘  ConnectionCommand  └───────────────┘
//!        │ paced by MessagePacer               │ owns
//!        ▼                                     ▼
//!   KuCoin WebSocket                 ConnectionPool + AckTracker
//! ```
//!
//! Connection tasks never touch shared state. They report `Opened`, `Ack`, `Snapshot` and
//! finally `Closed`, and they queue outbound requests so the owner never waits on the
//! exchange's message rate.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result`] with [`AdapterError`]; `is_recoverable()`
//! separates transient network and exchange failures from configuration mistakes.

pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod rate_limit;
pub mod timer;

pub use config::{ConnectionConfig, NotificationRetryConfig, RestConfig, TelegramConfig};
pub use error::{AdapterError, Result};
pub use input::{
    AckTracker, Assignment, ConnectionCommand, ConnectionEvent, ConnectionHandle,
    ConnectionPool, ConnectionStatus, Connector, DisconnectReason, ExchangeApi, ExpiredRequest,
    KucoinConnector, KucoinRestClient, OutboundKind, OutboundMessage, PendingRequest, PublicToken,
};
pub use output::{LogNotifier, NotificationDispatcher, Notifier, TelegramNotifier};
pub use rate_limit::{pacing_interval, MessagePacer};
pub use timer::TimerSlot;
