//! Session Controller
//!
//! One tokio task per client. It owns the subscription registry, the codec,
//! the keepalive timer and the transport link, and reacts to three sources
//! inside a single `select!` loop:
//!
//! - transport lifecycle events (`Open`, `Close`, `Message`, `Error`)
//! - commands from [`StreamClient`](super::client::StreamClient) handles
//! - the keepalive deadline
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> ConnectedUnauthenticated -> Authenticated
//!                     ^                                          |
//!                     +------------- Reconnecting <--------------+
//! ```
//!
//! On every `Open` the session clears the binary decoder, starts the
//! keepalive, sends `auth`, flushes queued subscription batches and sends the
//! full active set when it is not empty. On `Close` it stops the keepalive
//! and clears the authenticated flag; the transport reconnects on its own and
//! the next `Open` replays everything.
//!
//! Decoded messages go to the caller through a bounded buffer without
//! waiting. When the caller falls behind and the buffer is full, new items
//! are dropped and counted.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};

use super::codec::{CodecError, StreamCodec};
use super::keepalive::KeepaliveTimer;
use super::messages::{InboundMessage, OutboundMessage};
use crate::application::ports::{Frame, TransportEvent, TransportLink};
use crate::domain::subscription::{RequestOutcome, Subscription, SubscriptionRegistry};
use crate::infrastructure::config::{ConfigError, Credentials};
use crate::infrastructure::metrics::{self, ConnectionEvent};
use crate::infrastructure::telemetry::DebugLog;

// =============================================================================
// Error Type
// =============================================================================

/// Errors surfaced by the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// An inbound frame could not be decoded. The session keeps running.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The session task is gone.
    #[error("session closed")]
    Closed,

    /// The client configuration is unusable.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Item delivered on the caller's message channel.
pub type SessionItem = Result<InboundMessage, SessionError>;

// =============================================================================
// Session State
// =============================================================================

/// Connection state as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Not connected and not trying to.
    #[default]
    Disconnected,
    /// Waiting for the first socket.
    Connecting,
    /// Socket up, `auth` not yet sent.
    ConnectedUnauthenticated,
    /// `auth` sent; subscriptions go out immediately.
    Authenticated,
    /// Socket lost; waiting for the transport to reopen it.
    Reconnecting,
}

impl SessionState {
    /// Get a string label for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::ConnectedUnauthenticated => "connected_unauthenticated",
            Self::Authenticated => "authenticated",
            Self::Reconnecting => "reconnecting",
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Requests from client handles to the session task.
#[derive(Debug)]
pub enum SessionCommand {
    /// Add subscriptions to the active set.
    Subscribe(Vec<Subscription>),
    /// Drop the socket and connect again.
    Reconnect,
    /// Stop for good. Acknowledged once the transport is told to close.
    Disconnect(oneshot::Sender<()>),
    /// Snapshot the active set.
    ActiveSubscriptions(oneshot::Sender<Vec<Subscription>>),
}

// =============================================================================
// Session
// =============================================================================

enum Step {
    Transport(Option<TransportEvent>),
    Command(Option<SessionCommand>),
    KeepaliveDue,
}

enum Flow {
    Continue,
    Stop,
}

/// The session actor.
pub struct Session {
    credentials: Credentials,
    codec: StreamCodec,
    registry: SubscriptionRegistry,
    keepalive: KeepaliveTimer,
    link: TransportLink,
    commands: mpsc::Receiver<SessionCommand>,
    messages: mpsc::Sender<SessionItem>,
    state: Arc<RwLock<SessionState>>,
    debug: DebugLog,
}

impl Session {
    /// Assemble a session around an already-started transport link.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        credentials: Credentials,
        codec: StreamCodec,
        keepalive: KeepaliveTimer,
        link: TransportLink,
        commands: mpsc::Receiver<SessionCommand>,
        messages: mpsc::Sender<SessionItem>,
        state: Arc<RwLock<SessionState>>,
        debug: DebugLog,
    ) -> Self {
        Self {
            credentials,
            codec,
            registry: SubscriptionRegistry::new(),
            keepalive,
            link,
            commands,
            messages,
            state,
            debug,
        }
    }

    /// Run until disconnected, every handle is dropped, or the transport
    /// gives up.
    pub async fn run(mut self) {
        self.set_state(SessionState::Connecting);

        loop {
            let step = tokio::select! {
                event = self.link.events.recv() => Step::Transport(event),
                command = self.commands.recv() => Step::Command(command),
                () = self.keepalive.expired() => Step::KeepaliveDue,
            };

            match step {
                Step::Transport(Some(event)) => self.on_transport_event(event).await,
                Step::Transport(None) => {
                    tracing::warn!("Transport stopped, ending session");
                    self.keepalive.stop();
                    self.registry.mark_unauthenticated();
                    break;
                }
                Step::Command(Some(command)) => {
                    if matches!(self.on_command(command).await, Flow::Stop) {
                        break;
                    }
                }
                Step::Command(None) => {
                    tracing::debug!("All client handles dropped, disconnecting");
                    self.shutdown().await;
                    break;
                }
                Step::KeepaliveDue => self.send_ping().await,
            }
        }

        self.set_state(SessionState::Disconnected);
        tracing::info!("Okotoki session ended");
    }

    // -------------------------------------------------------------------------
    // Transport events
    // -------------------------------------------------------------------------

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => self.on_open().await,
            TransportEvent::Close { reason } => self.on_close(reason.as_deref()),
            TransportEvent::Message(frame) => self.on_frame(frame).await,
            TransportEvent::Error(error) => {
                tracing::warn!(error = %error, "Okotoki transport error");
            }
        }
    }

    /// Authenticate and restore the active set. An empty set sends no
    /// `subscribe` frame.
    async fn on_open(&mut self) {
        metrics::record_connection_event(ConnectionEvent::Open);
        self.set_state(SessionState::ConnectedUnauthenticated);
        tracing::info!(format = self.codec.format().as_str(), "Okotoki connection established");

        self.codec.clear_schema();
        self.keepalive.start();

        self.send(&OutboundMessage::Auth {
            key: self.credentials.api_key().to_string(),
            secret: self.credentials.api_secret().to_string(),
        })
        .await;
        self.set_state(SessionState::Authenticated);

        let active = self.registry.mark_authenticated();
        if active.is_empty() {
            tracing::debug!("No subscriptions to restore");
        } else {
            tracing::info!(count = active.len(), "Sending subscriptions");
            self.send_subscribe(active).await;
        }
    }

    fn on_close(&mut self, reason: Option<&str>) {
        metrics::record_connection_event(ConnectionEvent::Close);
        self.keepalive.stop();
        self.registry.mark_unauthenticated();
        self.set_state(SessionState::Reconnecting);
        tracing::info!(reason = reason.unwrap_or("unknown"), "Okotoki connection closed");
    }

    async fn on_frame(&mut self, frame: Frame) {
        self.keepalive.reset();

        let decoded = match &frame {
            Frame::Text(text) => {
                if self.debug.enabled() {
                    tracing::debug!(frame = %text, "Received text frame");
                }
                self.codec.decode_text(text)
            }
            Frame::Binary(data) => {
                if self.debug.enabled() {
                    tracing::debug!(bytes = data.len(), "Received binary frame");
                }
                self.codec.decode_binary(data)
            }
        };

        let message = match decoded {
            Ok(message) => message,
            Err(e) => {
                metrics::record_decode_error(self.codec.format());
                tracing::warn!(error = %e, bytes = frame.len(), "Failed to decode frame");
                self.deliver(Err(e.into()));
                return;
            }
        };

        metrics::record_message_received(self.codec.format(), message.type_name());
        if self.debug.enabled() {
            tracing::debug!(message = ?message, "Received message");
        }

        match message {
            InboundMessage::BinarySchema(ref bootstrap) => {
                match self.codec.load_schema(&bootstrap.schema) {
                    Ok(()) => {
                        tracing::info!("Binary schema loaded");
                        self.deliver(Ok(message));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected binary schema");
                        self.deliver(Err(e.into()));
                    }
                }
            }
            InboundMessage::Pong => {}
            InboundMessage::Subscribed(ack) => {
                tracing::debug!(count = ack.subscriptions.len(), "Subscriptions confirmed");
            }
            InboundMessage::Error(ref error) => {
                tracing::warn!(
                    code = %error.error_code,
                    message = %error.error_message,
                    "Okotoki server error"
                );
                self.deliver(Ok(message));
            }
            other => self.deliver(Ok(other)),
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    async fn on_command(&mut self, command: SessionCommand) -> Flow {
        match command {
            SessionCommand::Subscribe(batch) => {
                match self.registry.request(batch) {
                    RequestOutcome::Queued { pending_batches } => {
                        tracing::debug!(pending_batches, "Queued subscriptions until authenticated");
                    }
                    RequestOutcome::Send(active) => self.send_subscribe(active).await,
                }
                Flow::Continue
            }
            SessionCommand::Reconnect => {
                tracing::info!("Reconnect requested");
                self.keepalive.stop();
                self.registry.mark_unauthenticated();
                self.set_state(SessionState::Reconnecting);
                self.link.handle.reconnect().await;
                Flow::Continue
            }
            SessionCommand::Disconnect(done) => {
                self.shutdown().await;
                let _ = done.send(());
                Flow::Stop
            }
            SessionCommand::ActiveSubscriptions(reply) => {
                let _ = reply.send(self.registry.active().to_vec());
                Flow::Continue
            }
        }
    }

    async fn shutdown(&mut self) {
        tracing::info!("Disconnecting from Okotoki");
        self.keepalive.stop();
        self.registry.mark_unauthenticated();
        self.link.handle.close().await;
        self.set_state(SessionState::Disconnected);
    }

    // -------------------------------------------------------------------------
    // Outbound
    // -------------------------------------------------------------------------

    async fn send_ping(&mut self) {
        if self.debug.enabled() {
            tracing::debug!("Sending ping");
        }
        self.send(&OutboundMessage::Ping).await;
        metrics::record_ping_sent();
        self.keepalive.reset();
    }

    async fn send_subscribe(&self, subscriptions: Vec<Subscription>) {
        let count = subscriptions.len();
        self.send(&OutboundMessage::Subscribe { subscriptions }).await;
        metrics::record_subscribe_sent(count);
    }

    async fn send(&self, message: &OutboundMessage) {
        let text = match self.codec.encode(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, message_type = message.type_name(), "Failed to encode message");
                return;
            }
        };

        if self.debug.enabled() {
            match message {
                OutboundMessage::Auth { .. } => tracing::debug!("Sending auth"),
                other => tracing::debug!(message = ?other, "Sending message"),
            }
        }

        if let Err(e) = self.link.handle.send(Frame::Text(text)).await {
            tracing::warn!(error = %e, message_type = message.type_name(), "Failed to send message");
        }
    }

    /// Hand an item to the caller without waiting. A full buffer drops the
    /// item so control frames and commands keep flowing.
    fn deliver(&self, item: SessionItem) {
        match self.messages.try_send(item) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(item)) => {
                metrics::record_message_dropped();
                tracing::warn!(
                    ok = item.is_ok(),
                    capacity = self.messages.max_capacity(),
                    "Message buffer full, dropping message"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!("Message receiver dropped");
            }
        }
    }

    fn set_state(&self, next: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous != next {
            tracing::debug!(from = previous.as_str(), to = next.as_str(), "Session state changed");
        }
    }
}
