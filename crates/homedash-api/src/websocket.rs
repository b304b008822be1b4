//! Push channel with supervised auto-reconnect.
//!
//! [`ConnectionManager`] spawns one supervisor task that owns a
//! [`ConnectionMachine`]. Each connection attempt runs in its own transport
//! task tagged with a [`Generation`]; the transport reports back over an
//! mpsc channel and the supervisor decides what happens next. Parsed frames
//! from the current transport are relayed to subscribers through a
//! [`tokio::sync::broadcast`] channel, and status transitions are published
//! on a [`tokio::sync::watch`] channel.
//!
//! # Example
//!
//! ```rust,ignore
//! use homedash_api::{ConnectionManager, Credentials, ReconnectConfig};
//!
//! let manager = ConnectionManager::new(ws_url, ReconnectConfig::default());
//! let mut rx = manager.subscribe();
//! manager.start(Credentials::Demo);
//!
//! while let Ok(message) = rx.recv().await {
//!     println!("{}", message.type_name());
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::connection::{
    ConnectionMachine, ConnectionStatus, Credentials, Directive, Generation, HEARTBEAT_INTERVAL,
    Heartbeat, ReconnectConfig,
};
use crate::error::Error;
use crate::protocol::{self, InboundMessage, OutboundMessage};

// ── Broadcast channel capacity ───────────────────────────────────────

const MESSAGE_CHANNEL_CAPACITY: usize = 256;

// ── Internal events ──────────────────────────────────────────────────

#[derive(Debug)]
enum Control {
    Start(Credentials),
    Stop,
}

#[derive(Debug)]
struct TransportEvent {
    generation: Generation,
    kind: TransportEventKind,
}

#[derive(Debug)]
enum TransportEventKind {
    Opened,
    Frame(Arc<InboundMessage>),
    Closed(String),
    BackoffElapsed,
}

// ── ConnectionManager ────────────────────────────────────────────────

/// Handle to the push channel.
///
/// The supervisor task is spawned lazily on the first [`start`](Self::start),
/// so the manager can be built outside a runtime. Dropping the manager
/// tears everything down.
pub struct ConnectionManager {
    url: Url,
    reconnect: ReconnectConfig,
    heartbeat_interval: Duration,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    message_tx: broadcast::Sender<Arc<InboundMessage>>,
    control: Mutex<Option<mpsc::UnboundedSender<Control>>>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    pub fn new(url: Url, reconnect: ReconnectConfig) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::default());
        let (message_tx, _) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        Self {
            url,
            reconnect,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            status_tx: Arc::new(status_tx),
            message_tx,
            control: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Override the keepalive period (default 30s).
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Begin (or restart) a session. Must be called from within a Tokio
    /// runtime. Restarting supersedes any live transport and resets the
    /// attempt counter and terminal error.
    pub fn start(&self, credentials: Credentials) {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = match control.as_ref() {
            Some(tx) if !tx.is_closed() => tx.clone(),
            _ => {
                let (tx, rx) = mpsc::unbounded_channel();
                let supervisor = Supervisor {
                    url: self.url.clone(),
                    reconnect: self.reconnect.clone(),
                    heartbeat_interval: self.heartbeat_interval,
                    status_tx: Arc::clone(&self.status_tx),
                    message_tx: self.message_tx.clone(),
                    cancel: self.cancel.child_token(),
                };
                tokio::spawn(supervisor.run(rx));
                *control = Some(tx.clone());
                tx
            }
        };

        if sender.send(Control::Start(credentials)).is_err() {
            tracing::warn!("Push connection supervisor is gone, start ignored");
        }
    }

    /// Close the transport and stop reconnecting. Late callbacks from the
    /// closed transport are ignored.
    pub fn stop(&self) {
        let control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = control.as_ref() {
            let _ = tx.send(Control::Stop);
        }
    }

    /// Tear down the supervisor for good.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Get a new receiver for parsed server messages (heartbeat
    /// acknowledgments are consumed internally and never delivered).
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<InboundMessage>> {
        self.message_tx.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Supervisor ───────────────────────────────────────────────────────

struct Supervisor {
    url: Url,
    reconnect: ReconnectConfig,
    heartbeat_interval: Duration,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    message_tx: broadcast::Sender<Arc<InboundMessage>>,
    cancel: CancellationToken,
}

impl Supervisor {
    async fn run(self, mut control_rx: mpsc::UnboundedReceiver<Control>) {
        let mut machine = ConnectionMachine::new(self.reconnect.clone());
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<TransportEvent>();
        let mut credentials: Option<Credentials> = None;
        let mut transport: Option<CancellationToken> = None;

        loop {
            let directive = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                control = control_rx.recv() => {
                    let Some(control) = control else { break };
                    match control {
                        Control::Start(creds) => {
                            tracing::info!(url = %self.url, demo = creds.is_demo(), "Starting push connection");
                            cancel_transport(&mut transport);
                            credentials = Some(creds);
                            machine.start()
                        }
                        Control::Stop => {
                            tracing::info!("Stopping push connection");
                            cancel_transport(&mut transport);
                            machine.stop();
                            Directive::Ignore
                        }
                    }
                }
                Some(event) = event_rx.recv() => self.handle_event(&mut machine, event),
            };

            self.apply(directive, credentials.as_ref(), &event_tx, &mut transport);
            self.publish(&machine);
        }

        cancel_transport(&mut transport);
        machine.stop();
        self.publish(&machine);
        tracing::debug!("Push connection supervisor exiting");
    }

    fn handle_event(&self, machine: &mut ConnectionMachine, event: TransportEvent) -> Directive {
        let TransportEvent { generation, kind } = event;
        match kind {
            TransportEventKind::Opened => {
                if machine.on_open(generation) {
                    tracing::info!(%generation, "Push connection open");
                } else {
                    tracing::debug!(%generation, "Ignoring open from stale transport");
                }
                Directive::Ignore
            }
            TransportEventKind::Frame(message) => {
                if machine.is_current(generation) && machine.status().is_connected {
                    // No subscribers is fine.
                    let _ = self.message_tx.send(message);
                } else {
                    tracing::trace!(%generation, "Dropping frame from stale transport");
                }
                Directive::Ignore
            }
            TransportEventKind::Closed(reason) => {
                let directive = machine.on_closed(generation, &reason);
                if directive != Directive::Ignore {
                    tracing::warn!(%generation, %reason, "Push connection closed");
                }
                directive
            }
            TransportEventKind::BackoffElapsed => machine.on_backoff_elapsed(generation),
        }
    }

    fn apply(
        &self,
        directive: Directive,
        credentials: Option<&Credentials>,
        event_tx: &mpsc::UnboundedSender<TransportEvent>,
        transport: &mut Option<CancellationToken>,
    ) {
        match directive {
            Directive::Connect(generation) => {
                let Some(credentials) = credentials else {
                    return;
                };
                cancel_transport(transport);
                let token = self.cancel.child_token();
                let task = Transport {
                    url: self.url.clone(),
                    credentials: credentials.clone(),
                    generation,
                    heartbeat_interval: self.heartbeat_interval,
                    events: event_tx.clone(),
                    cancel: token.clone(),
                };
                tokio::spawn(task.run());
                *transport = Some(token);
            }
            Directive::Backoff { generation, delay } => {
                cancel_transport(transport);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    %generation,
                    "Waiting before reconnect"
                );
                // Occupies the transport slot so stop and restart cancel it.
                let token = self.cancel.child_token();
                spawn_backoff(event_tx.clone(), generation, delay, token.clone());
                *transport = Some(token);
            }
            Directive::GiveUp => {
                cancel_transport(transport);
                tracing::error!(
                    max_attempts = self.reconnect.max_attempts,
                    "Push reconnection limit reached, giving up"
                );
            }
            Directive::Ignore => {}
        }
    }

    fn publish(&self, machine: &ConnectionMachine) {
        let next = machine.status();
        self.status_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

fn cancel_transport(transport: &mut Option<CancellationToken>) {
    if let Some(token) = transport.take() {
        token.cancel();
    }
}

/// Report `BackoffElapsed` after `delay`, unless cancelled first.
fn spawn_backoff(
    events: mpsc::UnboundedSender<TransportEvent>,
    generation: Generation,
    delay: Duration,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::trace!(%generation, "Backoff timer cancelled");
            }
            () = tokio::time::sleep(delay) => {
                let _ = events.send(TransportEvent {
                    generation,
                    kind: TransportEventKind::BackoffElapsed,
                });
            }
        }
    });
}

/// Send one frame, failing if the peer stops draining the socket for longer
/// than `limit`.
async fn send_within<S>(sink: &mut S, message: Message, limit: Duration) -> Result<(), Error>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    match tokio::time::timeout(limit, sink.send(message)).await {
        Ok(sent) => sent.map_err(|e| Error::WebSocketConnect(e.to_string())),
        Err(_) => Err(Error::HeartbeatTimeout {
            silent_secs: limit.as_secs(),
        }),
    }
}

// ── Single connection lifecycle ──────────────────────────────────────

struct Transport {
    url: Url,
    credentials: Credentials,
    generation: Generation,
    heartbeat_interval: Duration,
    events: mpsc::UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
}

impl Transport {
    async fn run(self) {
        let reason = match self.connect_and_read().await {
            Ok(()) => "connection ended".to_owned(),
            Err(e) => e.to_string(),
        };
        self.emit(TransportEventKind::Closed(reason));
    }

    fn emit(&self, kind: TransportEventKind) {
        let _ = self.events.send(TransportEvent {
            generation: self.generation,
            kind,
        });
    }

    /// Connect, authenticate, then read until the socket drops, the peer
    /// goes silent for too long, or the transport is cancelled.
    async fn connect_and_read(&self) -> Result<(), Error> {
        tracing::info!(url = %self.url, generation = %self.generation, "Connecting to push channel");

        let (ws_stream, _response) = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Ok(()),
            result = tokio_tungstenite::connect_async(self.url.as_str()) => {
                result.map_err(|e| Error::WebSocketConnect(e.to_string()))?
            }
        };

        let (mut write, mut read) = ws_stream.split();

        let auth = OutboundMessage::auth(&self.credentials).to_json()?;
        write
            .send(Message::text(auth))
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
        self.emit(TransportEventKind::Opened);

        let ping = OutboundMessage::Ping.to_json()?;
        let opened_at = Instant::now();
        let mut heartbeat = Heartbeat::new(self.heartbeat_interval, opened_at);
        let mut ticker = tokio::time::interval_at(
            opened_at + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    let _ = send_within(&mut write, Message::Close(None), heartbeat.interval()).await;
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    if heartbeat.is_dead(now) {
                        let silent_secs = heartbeat.silence(now).as_secs();
                        tracing::warn!(silent_secs, "No traffic on push channel, forcing close");
                        let _ = send_within(&mut write, Message::Close(None), heartbeat.interval()).await;
                        return Err(Error::HeartbeatTimeout { silent_secs });
                    }
                    send_within(&mut write, Message::text(ping.clone()), heartbeat.interval()).await?;
                }
                frame = read.next() => {
                    let Some(frame) = frame else {
                        tracing::info!("Push stream ended");
                        return Ok(());
                    };
                    let frame = frame.map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                    heartbeat.record_activity(Instant::now());

                    match frame {
                        Message::Text(text) => self.forward(text.as_str()),
                        Message::Close(frame) => {
                            let (code, reason) = frame
                                .map(|cf| (u16::from(cf.code), cf.reason.to_string()))
                                .unwrap_or((1005, String::new()));
                            return Err(Error::WebSocketClosed { code, reason });
                        }
                        // Protocol pings are answered by tungstenite.
                        _ => {}
                    }
                }
            }
        }
    }

    fn forward(&self, text: &str) {
        match protocol::parse_inbound(text) {
            Ok(InboundMessage::Pong {}) => tracing::trace!("Heartbeat acknowledged"),
            Ok(message) => {
                tracing::debug!(kind = message.type_name(), "Push frame received");
                self.emit(TransportEventKind::Frame(Arc::new(message)));
            }
            Err(e) => tracing::warn!(error = %e, "Dropping unparseable push frame"),
        }
    }
}
