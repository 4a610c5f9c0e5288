//! WebSocket Transport
//!
//! [`TransportConnector`] adapter on `tokio-tungstenite`. Each link is served
//! by one spawned task that owns the socket:
//!
//! - connects with a per-attempt timeout and emits `Open`
//! - pumps frames in both directions and answers protocol pings
//! - emits `Close` when the socket goes away, waits a backoff delay from
//!   [`ReconnectPolicy`] and tries again
//! - gives up once the retry budget is spent, emitting `Error` and a final
//!   `Close`
//!
//! Frames sent while no socket is up are dropped.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
use crate::application::ports::{
    Frame, TransportConnector, TransportError, TransportEvent, TransportHandle, TransportLink,
};
use crate::infrastructure::config::TransportSettings;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_CAPACITY: usize = 1024;
const COMMAND_CAPACITY: usize = 256;

// =============================================================================
// Connector
// =============================================================================

/// Opens WebSocket links.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    settings: TransportSettings,
}

impl WsConnector {
    /// Create a connector with the given timings.
    #[must_use]
    pub const fn new(settings: TransportSettings) -> Self {
        Self { settings }
    }
}

impl TransportConnector for WsConnector {
    fn connect(&self, target: Url) -> TransportLink {
        let (event_tx, events) = mpsc::channel(EVENT_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let cancel = CancellationToken::new();

        let task = WsTask {
            target,
            settings: self.settings.clone(),
            event_tx,
            command_rx,
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run());

        TransportLink {
            handle: Box::new(WsHandle { command_tx, cancel }),
            events,
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

#[derive(Debug)]
enum Command {
    Send(Frame),
    Reconnect,
}

struct WsHandle {
    command_tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
}

#[async_trait]
impl TransportHandle for WsHandle {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.command_tx
            .send(Command::Send(frame))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        self.cancel.cancel();
    }

    async fn reconnect(&self) {
        if self.command_tx.send(Command::Reconnect).await.is_err() {
            tracing::debug!("Reconnect requested after transport stopped");
        }
    }
}

// =============================================================================
// Connection Task
// =============================================================================

/// How a connected socket ended.
enum SocketEnd {
    /// `close()` was called or every handle is gone.
    Stopped,
    /// `reconnect()` was called.
    ReconnectNow,
    /// The socket failed or the peer closed it.
    Lost(Option<String>),
}

/// How a backoff wait ended.
enum WaitEnd {
    Elapsed,
    Stopped,
}

struct WsTask {
    target: Url,
    settings: TransportSettings,
    event_tx: mpsc::Sender<TransportEvent>,
    command_rx: mpsc::Receiver<Command>,
    cancel: CancellationToken,
}

impl WsTask {
    async fn run(mut self) {
        let mut policy =
            ReconnectPolicy::new(ReconnectConfig::from_transport_settings(&self.settings));

        loop {
            let attempt = tokio::select! {
                () = self.cancel.cancelled() => break,
                attempt = self.connect_once() => attempt,
            };

            match attempt {
                Ok(ws) => {
                    policy.reset();
                    tracing::info!(url = %self.target, "Okotoki socket open");
                    if !self.emit(TransportEvent::Open).await {
                        break;
                    }

                    match self.pump(ws).await {
                        SocketEnd::Stopped => {
                            let _ = self
                                .event_tx
                                .send(TransportEvent::Close { reason: None })
                                .await;
                            break;
                        }
                        SocketEnd::ReconnectNow => {
                            let dropped = discard_queued_sends(&mut self.command_rx);
                            if dropped > 0 {
                                tracing::debug!(dropped, "Dropped frames queued for the old socket");
                            }
                            let reason = Some("reconnect requested".to_string());
                            if !self.emit(TransportEvent::Close { reason }).await {
                                break;
                            }
                            continue;
                        }
                        SocketEnd::Lost(reason) => {
                            tracing::warn!(reason = ?reason, "Okotoki socket lost");
                            if !self.emit(TransportEvent::Close { reason }).await {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %self.target, error = %e, "Okotoki connection attempt failed");
                    if !self.emit(TransportEvent::Error(e.to_string())).await {
                        break;
                    }
                }
            }

            let Some(delay) = policy.next_delay() else {
                let err = ReconnectError::RetriesExhausted(policy.attempt_count());
                tracing::error!(error = %err, "Giving up on Okotoki socket");
                let _ = self.event_tx.send(TransportEvent::Error(err.to_string())).await;
                let _ = self
                    .event_tx
                    .send(TransportEvent::Close { reason: Some(err.to_string()) })
                    .await;
                break;
            };

            tracing::info!(
                attempt = policy.attempt_count(),
                delay_ms = delay.as_millis(),
                "Reconnecting to Okotoki stream"
            );

            match self.wait_backoff(delay, &mut policy).await {
                WaitEnd::Elapsed => {}
                WaitEnd::Stopped => break,
            }
        }

        tracing::debug!(url = %self.target, "Okotoki transport stopped");
    }

    async fn connect_once(&self) -> Result<WsStream, TransportError> {
        tracing::debug!(url = %self.target, "Connecting to Okotoki stream");

        let connect = tokio_tungstenite::connect_async(self.target.as_str());
        match tokio::time::timeout(self.settings.connection_timeout, connect).await {
            Ok(Ok((ws, _response))) => Ok(ws),
            Ok(Err(e)) => Err(TransportError::ConnectionFailed(e.to_string())),
            Err(_) => Err(TransportError::ConnectionFailed(format!(
                "timed out after {}ms",
                self.settings.connection_timeout.as_millis()
            ))),
        }
    }

    async fn pump(&mut self, ws: WsStream) -> SocketEnd {
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SocketEnd::Stopped;
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(Command::Send(frame)) => {
                            if let Err(e) = write.send(to_message(frame)).await {
                                return SocketEnd::Lost(Some(e.to_string()));
                            }
                        }
                        Some(Command::Reconnect) => {
                            let _ = write.send(Message::Close(None)).await;
                            return SocketEnd::ReconnectNow;
                        }
                        None => {
                            let _ = write.send(Message::Close(None)).await;
                            return SocketEnd::Stopped;
                        }
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let frame = Frame::Text(text.as_str().to_owned());
                            if !self.emit(TransportEvent::Message(frame)).await {
                                return SocketEnd::Stopped;
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            let frame = Frame::Binary(data.to_vec());
                            if !self.emit(TransportEvent::Message(frame)).await {
                                return SocketEnd::Stopped;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                return SocketEnd::Lost(Some(e.to_string()));
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!("Server sent close frame");
                            return SocketEnd::Lost(frame.map(|f| f.reason.as_str().to_owned()));
                        }
                        Some(Ok(_)) => {
                            // Pong and raw frames carry nothing for the session
                        }
                        Some(Err(e)) => {
                            let _ = self.event_tx.send(TransportEvent::Error(e.to_string())).await;
                            return SocketEnd::Lost(Some(e.to_string()));
                        }
                        None => {
                            tracing::info!("WebSocket stream ended");
                            return SocketEnd::Lost(None);
                        }
                    }
                }
            }
        }
    }

    async fn wait_backoff(
        &mut self,
        delay: std::time::Duration,
        policy: &mut ReconnectPolicy,
    ) -> WaitEnd {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return WaitEnd::Stopped,
                () = &mut sleep => return WaitEnd::Elapsed,
                command = self.command_rx.recv() => {
                    match command {
                        Some(Command::Send(frame)) => {
                            tracing::debug!(bytes = frame.len(), "Dropping frame, socket is down");
                        }
                        Some(Command::Reconnect) => {
                            policy.reset();
                            return WaitEnd::Elapsed;
                        }
                        None => return WaitEnd::Stopped,
                    }
                }
            }
        }
    }

    /// Deliver an event. Returns `false` once the session stopped listening.
    async fn emit(&self, event: TransportEvent) -> bool {
        if self.event_tx.send(event).await.is_err() {
            tracing::debug!("Transport event channel closed");
            return false;
        }
        true
    }
}

/// Drop frames queued for a socket that is going away. Extra reconnect
/// requests collapse into the one already in progress.
fn discard_queued_sends(command_rx: &mut mpsc::Receiver<Command>) -> usize {
    let mut dropped = 0;
    while let Ok(command) = command_rx.try_recv() {
        if let Command::Send(frame) = command {
            tracing::trace!(bytes = frame.len(), "Discarding queued frame");
            dropped += 1;
        }
    }
    dropped
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn unreachable_settings(max_retries: u32) -> TransportSettings {
        TransportSettings {
            connection_timeout: Duration::from_millis(200),
            min_reconnect_delay: Duration::from_millis(10),
            max_reconnect_delay: Duration::from_millis(20),
            max_retries,
        }
    }

    #[test]
    fn frames_map_to_messages() {
        assert!(matches!(to_message(Frame::Text("{}".to_string())), Message::Text(_)));
        assert!(matches!(to_message(Frame::Binary(vec![1, 2])), Message::Binary(_)));
    }

    #[tokio::test]
    async fn queued_sends_are_discarded() {
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(Command::Send(Frame::Text("{\"type\":\"ping\"}".to_string())))
            .await
            .unwrap();
        tx.send(Command::Reconnect).await.unwrap();
        tx.send(Command::Send(Frame::Binary(vec![1, 2, 3]))).await.unwrap();

        assert_eq!(discard_queued_sends(&mut rx), 2);
        assert!(rx.try_recv().is_err());

        tx.send(Command::Send(Frame::Text("{}".to_string()))).await.unwrap();
        assert!(matches!(rx.recv().await, Some(Command::Send(_))));
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let connector = WsConnector::new(unreachable_settings(2));
        // Port 9 (discard) on loopback refuses connections.
        let target = Url::parse("ws://127.0.0.1:9/ws?useBinary=false").unwrap();
        let mut link = connector.connect(target);

        let mut errors = 0;
        let mut closed = false;
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_secs(5), link.events.recv()).await
        {
            match event {
                TransportEvent::Error(_) => errors += 1,
                TransportEvent::Close { reason } => {
                    assert!(reason.is_some_and(|r| r.contains("exceeded")));
                    closed = true;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }

        // Initial attempt plus two retries fail, then the exhaustion error.
        assert_eq!(errors, 4);
        assert!(closed);
    }

    #[tokio::test]
    async fn close_stops_task() {
        let connector = WsConnector::new(unreachable_settings(0));
        let target = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        let mut link = connector.connect(target);

        link.handle.close().await;

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while link.events.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok(), "event stream should end after close");
        assert!(matches!(
            link.handle.send(Frame::Text("{}".to_string())).await,
            Err(TransportError::Closed)
        ));
    }
}
