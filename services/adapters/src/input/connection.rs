//! WebSocket connection task
//!
//! Each connection runs as its own task: fetch a session token (bounded retries), connect
//! to `{endpoint}?token=..&connectId=..`, wait for the server's welcome, then loop over
//! inbound frames, paced outbound requests and keepalive pings until the socket dies or
//! the owner asks it to close. The task reports back over an event channel and always
//! ends with exactly one [`ConnectionEvent::Closed`].

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};
use types::{ConnectionId, RequestId, TradeSnapshot};
use url::Url;

use super::keepalive::KeepaliveMonitor;
use super::protocol::{parse_snapshot, InboundMessage, OutboundMessage, SNAPSHOT_SUBJECT};
use super::rest::{ExchangeApi, PublicToken};
use crate::config::ConnectionConfig;
use crate::rate_limit::MessagePacer;
use crate::{AdapterError, Result};

/// Reason a connection task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Owner asked for the close or dropped the handle
    Requested,
    /// Server sent a close frame
    ServerClosed,
    /// Stream ended without a close frame
    StreamEnded,
    /// Ping went unanswered past the negotiated timeout
    KeepaliveTimeout,
    /// Token, connect, handshake, transport or protocol failure
    Error(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Requested => f.write_str("requested"),
            DisconnectReason::ServerClosed => f.write_str("server closed"),
            DisconnectReason::StreamEnded => f.write_str("stream ended"),
            DisconnectReason::KeepaliveTimeout => f.write_str("keepalive timeout"),
            DisconnectReason::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Event reported by a connection task to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Welcome received, ready for subscriptions
    Opened { connection: ConnectionId },
    /// Server acknowledged a subscribe/unsubscribe
    Ack {
        connection: ConnectionId,
        request: RequestId,
    },
    /// Market snapshot push
    Snapshot {
        connection: ConnectionId,
        snapshot: TradeSnapshot,
    },
    /// Task ended; no further events follow for this connection
    Closed {
        connection: ConnectionId,
        reason: DisconnectReason,
    },
}

/// Instruction from the owner to a connection task
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionCommand {
    /// Queue a message; the task paces delivery
    Send(OutboundMessage),
    /// Close the socket and end the task
    Close,
}

/// Owner-side handle to a connection task
///
/// Sends never block: commands are queued and the task paces them onto the socket.
/// Dropping the handle closes the connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    commands: mpsc::UnboundedSender<ConnectionCommand>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, commands: mpsc::UnboundedSender<ConnectionCommand>) -> Self {
        Self { id, commands }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a message for paced delivery
    pub fn send(&self, message: OutboundMessage) -> Result<()> {
        self.commands
            .send(ConnectionCommand::Send(message))
            .map_err(|_| AdapterError::ConnectionClosed {
                connection: self.id,
                reason: Some("connection task has exited".to_string()),
            })
    }

    /// Ask the task to close; a no-op if it already exited
    pub fn close(&self) {
        let _ = self.commands.send(ConnectionCommand::Close);
    }
}

/// Opens exchange connections
///
/// Implementations spawn the connection and return immediately; progress is reported on
/// `events`.
pub trait Connector: Send + Sync {
    fn open(&self, id: ConnectionId, events: mpsc::Sender<ConnectionEvent>) -> ConnectionHandle;
}

/// Connector for the KuCoin public market feed
pub struct KucoinConnector {
    api: Arc<dyn ExchangeApi>,
    config: ConnectionConfig,
}

impl KucoinConnector {
    pub fn new(api: Arc<dyn ExchangeApi>, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { api, config })
    }
}

impl Connector for KucoinConnector {
    fn open(&self, id: ConnectionId, events: mpsc::Sender<ConnectionEvent>) -> ConnectionHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let api = self.api.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let reason = match run_session(id, api.as_ref(), &config, commands_rx, &events).await {
                Ok(reason) => reason,
                Err(e) => {
                    if e.is_recoverable() {
                        warn!(connection = %id, error = %e, "Connection failed");
                    } else {
                        error!(connection = %id, error = %e, "Connection failed permanently");
                    }
                    DisconnectReason::Error(e.to_string())
                }
            };
            info!(connection = %id, reason = %reason, "Connection closed");
            let _ = events
                .send(ConnectionEvent::Closed {
                    connection: id,
                    reason,
                })
                .await;
        });

        ConnectionHandle::new(id, commands_tx)
    }
}

async fn fetch_token(
    id: ConnectionId,
    api: &dyn ExchangeApi,
    config: &ConnectionConfig,
) -> Result<PublicToken> {
    let mut attempt = 1;
    loop {
        match api.public_token().await {
            Ok(token) => return Ok(token),
            Err(e) if e.is_recoverable() && attempt < config.token_attempts => {
                warn!(
                    connection = %id,
                    attempt,
                    max_attempts = config.token_attempts,
                    error = %e,
                    "Token request failed, retrying"
                );
                attempt += 1;
                sleep(config.token_retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn run_session(
    id: ConnectionId,
    api: &dyn ExchangeApi,
    config: &ConnectionConfig,
    mut commands: mpsc::UnboundedReceiver<ConnectionCommand>,
    events: &mpsc::Sender<ConnectionEvent>,
) -> Result<DisconnectReason> {
    let token = fetch_token(id, api, config).await?;
    let server = token.server()?.clone();
    if server.ping_interval == 0 {
        return Err(AdapterError::InvalidNumeric {
            value: "pingInterval=0".to_string(),
        });
    }
    let connect_id = id.to_string();
    let url = Url::parse_with_params(
        &server.endpoint,
        &[("token", token.token.as_str()), ("connectId", connect_id.as_str())],
    )?;

    let timeout_ms = config.connect_timeout.as_millis() as u64;
    let (ws_stream, _) = timeout(config.connect_timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| AdapterError::ConnectionTimeout {
            connection: id,
            timeout_ms,
        })?
        .map_err(|e| AdapterError::ConnectionFailed {
            connection: id,
            reason: e.to_string(),
        })?;

    let (mut sink, mut stream) = ws_stream.split();

    timeout(config.connect_timeout, wait_for_welcome(id, &mut stream))
        .await
        .map_err(|_| AdapterError::ConnectionTimeout {
            connection: id,
            timeout_ms,
        })??;

    info!(connection = %id, endpoint = %server.endpoint, "Connection open");
    if events
        .send(ConnectionEvent::Opened { connection: id })
        .await
        .is_err()
    {
        return Ok(DisconnectReason::Requested);
    }

    let pacer = MessagePacer::new(config.message_rate()?)?;
    let mut keepalive = KeepaliveMonitor::new(server.ping_interval(), server.ping_timeout());
    let mut ping_timer =
        tokio::time::interval_at(Instant::now() + keepalive.interval(), keepalive.interval());
    let mut outbound: VecDeque<OutboundMessage> = VecDeque::new();

    loop {
        let deadline = keepalive.deadline();

        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(id, &text, &mut keepalive, events).await?;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        sink.send(Message::Pong(payload)).await?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!(connection = %id, frame = ?frame, "Connection closed by server");
                        return Ok(DisconnectReason::ServerClosed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(DisconnectReason::StreamEnded),
                }
            }

            command = commands.recv() => {
                match command {
                    Some(ConnectionCommand::Send(message)) => outbound.push_back(message),
                    Some(ConnectionCommand::Close) | None => {
                        let _ = sink.close().await;
                        return Ok(DisconnectReason::Requested);
                    }
                }
            }

            _ = pacer.until_ready(), if !outbound.is_empty() => {
                if let Some(message) = outbound.pop_front() {
                    send_message(&mut sink, &message).await?;
                }
            }

            _ = ping_timer.tick() => {
                let ping_id = chrono::Utc::now().timestamp_millis().to_string();
                // Pings go ahead of queued requests
                outbound.push_front(keepalive.ping(ping_id, Instant::now()));
            }

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                warn!(
                    connection = %id,
                    timeout_ms = keepalive.timeout().as_millis() as u64,
                    "Keepalive timeout"
                );
                let _ = sink.close().await;
                return Ok(DisconnectReason::KeepaliveTimeout);
            }
        }
    }
}

async fn wait_for_welcome<S>(id: ConnectionId, stream: &mut S) -> Result<()>
where
    S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => {
                return match InboundMessage::parse(&text)? {
                    InboundMessage::Welcome { .. } => Ok(()),
                    other => Err(AdapterError::ProtocolDesync(format!(
                        "expected welcome, got {:?}",
                        other
                    ))),
                };
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    Err(AdapterError::ConnectionClosed {
        connection: id,
        reason: Some("closed before welcome".to_string()),
    })
}

async fn send_message<S>(sink: &mut S, message: &OutboundMessage) -> Result<()>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = message.to_json()?;
    debug!(message = %text, "Sending");
    sink.send(Message::Text(text)).await?;
    Ok(())
}

async fn handle_text(
    id: ConnectionId,
    text: &str,
    keepalive: &mut KeepaliveMonitor,
    events: &mpsc::Sender<ConnectionEvent>,
) -> Result<()> {
    let event = match InboundMessage::parse(text)? {
        InboundMessage::Ack { id: request } => match RequestId::from_wire(&request) {
            Some(request) => ConnectionEvent::Ack {
                connection: id,
                request,
            },
            None => {
                debug!(connection = %id, ack = %request, "Ignoring ack with foreign id");
                return Ok(());
            }
        },
        InboundMessage::Message {
            topic,
            subject,
            data,
        } => {
            if subject.as_deref() != Some(SNAPSHOT_SUBJECT) {
                debug!(connection = %id, topic = %topic, subject = ?subject, "Ignoring message");
                return Ok(());
            }
            ConnectionEvent::Snapshot {
                connection: id,
                snapshot: parse_snapshot(&data)?,
            }
        }
        InboundMessage::Pong { id: pong } => {
            if !keepalive.on_pong(pong.as_deref()) {
                debug!(connection = %id, pong = ?pong, "Unmatched pong");
            }
            return Ok(());
        }
        InboundMessage::Error { id: request, code, data } => {
            warn!(
                connection = %id,
                request = ?request,
                code = ?code,
                data = ?data,
                "Exchange reported an error"
            );
            return Ok(());
        }
        InboundMessage::Welcome { .. } => {
            debug!(connection = %id, "Duplicate welcome");
            return Ok(());
        }
    };

    events
        .send(event)
        .await
        .map_err(|_| AdapterError::ConnectionClosed {
            connection: id,
            reason: Some("event receiver dropped".to_string()),
        })
}
