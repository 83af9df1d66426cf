//! Connection pool
//!
//! Owns every live exchange connection and the number of subscription slots taken on
//! each. Pairs are placed on the first connection (lowest id) with a free slot; when none
//! has one, a new connection is opened and the pair waits on it until the welcome
//! arrives. Slots are reserved at assignment time, so a batch of `N` pairs against an
//! empty pool opens exactly `ceil(N / max_subscriptions)` connections.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use types::ConnectionId;

use super::connection::{ConnectionEvent, ConnectionHandle, Connector};
use super::protocol::OutboundMessage;
use crate::{AdapterError, Result};

/// Lifecycle of a pooled connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Token/connect/welcome in progress
    Connecting,
    /// Welcome received
    Open,
}

/// Outcome of looking for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Connection with a free slot
    Existing(ConnectionId),
    /// Every connection is full
    NewConnection,
}

#[derive(Debug)]
struct PooledConnection {
    handle: ConnectionHandle,
    status: ConnectionStatus,
    subscriptions: usize,
}

pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    events: mpsc::Sender<ConnectionEvent>,
    connections: BTreeMap<ConnectionId, PooledConnection>,
    next_id: u64,
    max_subscriptions: usize,
}

impl ConnectionPool {
    pub fn new(
        connector: Arc<dyn Connector>,
        events: mpsc::Sender<ConnectionEvent>,
        max_subscriptions: usize,
    ) -> Result<Self> {
        if max_subscriptions == 0 {
            return Err(AdapterError::Configuration(
                "Max subscriptions per connection must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            connector,
            events,
            connections: BTreeMap::new(),
            next_id: 1,
            max_subscriptions,
        })
    }

    /// First connection with a free slot, or a request for a new one
    pub fn assign(&self) -> Assignment {
        self.connections
            .iter()
            .find(|(_, connection)| connection.subscriptions < self.max_subscriptions)
            .map(|(id, _)| Assignment::Existing(*id))
            .unwrap_or(Assignment::NewConnection)
    }

    /// Take a slot for one pair, opening a connection when every existing one is full
    pub fn reserve(&mut self) -> ConnectionId {
        let id = match self.assign() {
            Assignment::Existing(id) => id,
            Assignment::NewConnection => self.open(),
        };
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.subscriptions += 1;
        }
        id
    }

    /// Give a slot back
    pub fn release(&mut self, id: ConnectionId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.subscriptions = connection.subscriptions.saturating_sub(1);
        }
    }

    /// Open a new connection; it reports progress on the pool's event channel
    pub fn open(&mut self) -> ConnectionId {
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;

        let handle = self.connector.open(id, self.events.clone());
        self.connections.insert(
            id,
            PooledConnection {
                handle,
                status: ConnectionStatus::Connecting,
                subscriptions: 0,
            },
        );
        info!(connection = %id, total = self.connections.len(), "Opening connection");
        id
    }

    /// Record the welcome; `false` for connections no longer in the pool
    pub fn mark_open(&mut self, id: ConnectionId) -> bool {
        match self.connections.get_mut(&id) {
            Some(connection) => {
                connection.status = ConnectionStatus::Open;
                true
            }
            None => false,
        }
    }

    /// Forget a connection whose task has ended; `false` if it was already gone
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            debug!(connection = %id, remaining = self.connections.len(), "Connection removed");
        }
        removed
    }

    /// Close every connection and forget them
    pub fn close_all(&mut self) {
        for (_, connection) in std::mem::take(&mut self.connections) {
            connection.handle.close();
        }
    }

    /// Queue a message on an open connection
    pub fn send(&self, id: ConnectionId, message: OutboundMessage) -> Result<()> {
        let connection = self
            .connections
            .get(&id)
            .ok_or_else(|| AdapterError::ConnectionClosed {
                connection: id,
                reason: Some("not in pool".to_string()),
            })?;
        connection.handle.send(message)
    }

    pub fn status(&self, id: ConnectionId) -> Option<ConnectionStatus> {
        self.connections.get(&id).map(|connection| connection.status)
    }

    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.status(id) == Some(ConnectionStatus::Open)
    }

    pub fn subscription_count(&self, id: ConnectionId) -> usize {
        self.connections
            .get(&id)
            .map(|connection| connection.subscriptions)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
