//! In-memory transport for driving a session without a socket.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use url::Url;

use okotoki_stream_client::{
    ClientConfig, Credentials, Frame, TransportConnector, TransportError, TransportEvent,
    TransportHandle, TransportLink,
};

/// What the session asked the transport to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    Send(Frame),
    Close,
    Reconnect,
}

struct FakeHandle {
    controls: mpsc::UnboundedSender<Control>,
}

#[async_trait]
impl TransportHandle for FakeHandle {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.controls
            .send(Control::Send(frame))
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        let _ = self.controls.send(Control::Close);
    }

    async fn reconnect(&self) {
        let _ = self.controls.send(Control::Reconnect);
    }
}

/// Connector handing out a single scripted link.
pub struct FakeConnector {
    events: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
    controls: mpsc::UnboundedSender<Control>,
    target: Arc<Mutex<Option<Url>>>,
}

impl TransportConnector for FakeConnector {
    fn connect(&self, target: Url) -> TransportLink {
        *self.target.lock() = Some(target);
        let events = self.events.lock().take().expect("fake connector used twice");
        TransportLink {
            handle: Box::new(FakeHandle {
                controls: self.controls.clone(),
            }),
            events,
        }
    }
}

/// Server side of the fake link.
pub struct FakeServer {
    events: mpsc::Sender<TransportEvent>,
    controls: mpsc::UnboundedReceiver<Control>,
    target: Arc<Mutex<Option<Url>>>,
}

/// Create a connected connector/server pair.
pub fn fake_transport() -> (FakeConnector, FakeServer) {
    let (event_tx, event_rx) = mpsc::channel(64);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let target = Arc::new(Mutex::new(None));

    (
        FakeConnector {
            events: Mutex::new(Some(event_rx)),
            controls: control_tx,
            target: Arc::clone(&target),
        },
        FakeServer {
            events: event_tx,
            controls: control_rx,
            target,
        },
    )
}

/// Test configuration pointing at a dummy endpoint.
pub fn config() -> ClientConfig {
    ClientConfig::new(Credentials::new("test-key", "test-secret"))
        .with_ws_url("wss://okotoki.test/ws")
}

impl FakeServer {
    pub fn target(&self) -> Option<Url> {
        self.target.lock().clone()
    }

    pub async fn emit(&self, event: TransportEvent) {
        self.events.send(event).await.unwrap();
        settle().await;
    }

    pub async fn open(&self) {
        self.emit(TransportEvent::Open).await;
    }

    pub async fn close(&self) {
        self.emit(TransportEvent::Close { reason: None }).await;
    }

    pub async fn text(&self, text: &str) {
        self.emit(TransportEvent::Message(Frame::Text(text.to_string())))
            .await;
    }

    pub async fn binary(&self, data: Vec<u8>) {
        self.emit(TransportEvent::Message(Frame::Binary(data))).await;
    }

    /// Next control the session issued.
    pub async fn next_control(&mut self) -> Control {
        tokio::time::timeout(Duration::from_secs(1), self.controls.recv())
            .await
            .expect("no control within 1s")
            .expect("control channel closed")
    }

    /// Next sent frame, parsed as JSON.
    pub async fn next_json(&mut self) -> serde_json::Value {
        match self.next_control().await {
            Control::Send(Frame::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    /// Consume the auth frame and the subscribe frame that follow an open,
    /// returning the subscriptions.
    pub async fn expect_handshake(&mut self) -> serde_json::Value {
        let auth = self.next_json().await;
        assert_eq!(auth["type"], "auth");
        let subscribe = self.next_json().await;
        assert_eq!(subscribe["type"], "subscribe");
        subscribe["subscriptions"].clone()
    }

    /// Assert the session issued nothing since the last read.
    pub async fn assert_quiet(&mut self) {
        settle().await;
        if let Ok(control) = self.controls.try_recv() {
            panic!("unexpected control {control:?}");
        }
    }
}

/// Let the session task drain its queues.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
