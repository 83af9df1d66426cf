//! Input side: REST collaborator, WebSocket connections and subscription bookkeeping

pub mod ack_tracker;
pub mod connection;
pub mod keepalive;
pub mod pool;
pub mod protocol;
pub mod rest;

pub use ack_tracker::{AckTracker, ExpiredRequest, PendingRequest};
pub use connection::{
    ConnectionCommand, ConnectionEvent, ConnectionHandle, Connector, DisconnectReason,
    KucoinConnector,
};
pub use keepalive::KeepaliveMonitor;
pub use pool::{Assignment, ConnectionPool, ConnectionStatus};
pub use protocol::{parse_snapshot, InboundMessage, OutboundKind, OutboundMessage, SNAPSHOT_SUBJECT};
pub use rest::{ExchangeApi, InstanceServer, KucoinRestClient, PublicToken};
