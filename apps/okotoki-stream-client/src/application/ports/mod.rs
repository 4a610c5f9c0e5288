//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TransportConnector`: opens a reconnect-capable duplex socket
//! - `TransportHandle`: `send` / `close` / `reconnect` controls of an open link
//!
//! The transport owns retry and backoff. The session only sees the four
//! lifecycle events on the link's event channel and may observe `Open` and
//! `Close` any number of times.

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

// =============================================================================
// Frames and Events
// =============================================================================

/// A single socket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Frame {
    /// Get the payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    /// Check if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lifecycle events emitted by a transport link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A socket is up and ready to send.
    Open,
    /// The socket went away. The transport may reopen it later.
    Close {
        /// Close reason, if the peer or the transport gave one.
        reason: Option<String>,
    },
    /// An inbound frame.
    Message(Frame),
    /// A connectivity error. Informational only.
    Error(String),
}

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by transport controls.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport task is gone.
    #[error("transport closed")]
    Closed,

    /// Connecting failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

// =============================================================================
// Ports
// =============================================================================

/// Controls of an open transport link.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Queue a frame for sending.
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Close the socket and stop reconnecting.
    async fn close(&self);

    /// Drop the current socket and connect again right away.
    async fn reconnect(&self);
}

/// Factory for transport links.
pub trait TransportConnector: Send + Sync {
    /// Start connecting to `target` and return the link.
    fn connect(&self, target: Url) -> TransportLink;
}

/// A transport link: controls plus the event stream.
pub struct TransportLink {
    /// Outbound controls.
    pub handle: Box<dyn TransportHandle>,
    /// Lifecycle events, in order.
    pub events: mpsc::Receiver<TransportEvent>,
}

impl std::fmt::Debug for TransportLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportLink").finish_non_exhaustive()
    }
}
