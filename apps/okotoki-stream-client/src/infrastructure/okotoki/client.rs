//! Stream Client Handle
//!
//! Cloneable front end of a session. [`StreamClient::connect`] starts the
//! transport and the session task and hands back the handle together with
//! the receiver of decoded messages.
//!
//! # Example
//!
//! ```rust,no_run
//! use okotoki_stream_client::domain::market::Exchange;
//! use okotoki_stream_client::infrastructure::config::{ClientConfig, Credentials};
//! use okotoki_stream_client::infrastructure::okotoki::{StreamClient, WsConnector};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new(Credentials::new("key", "secret"));
//!     let connector = WsConnector::new(config.transport.clone());
//!     let (client, mut messages) = StreamClient::connect(&config, &connector)?;
//!
//!     client.price([(Exchange::Bitmex, "XBTUSD")]).await?;
//!
//!     while let Some(message) = messages.recv().await {
//!         println!("{:?}", message?);
//!     }
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};

use super::codec::StreamCodec;
use super::keepalive::{KeepaliveConfig, KeepaliveTimer};
use super::session::{Session, SessionCommand, SessionError, SessionItem, SessionState};
use crate::application::ports::TransportConnector;
use crate::domain::market::Exchange;
use crate::domain::subscription::{
    self, LeveledTradeVolumeSubscriptionOptions, OrderBookSubscriptionOptions, Subscription,
    TradeSubscriptionOptions,
};
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::telemetry::DebugLog;

const COMMAND_CAPACITY: usize = 64;

/// Handle to a running session.
#[derive(Debug, Clone)]
pub struct StreamClient {
    commands: mpsc::Sender<SessionCommand>,
    state: Arc<RwLock<SessionState>>,
}

impl StreamClient {
    /// Open a session.
    ///
    /// Builds the connection target from `config`, starts the transport
    /// through `connector` and spawns the session task. Must be called from
    /// within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the socket URL is invalid.
    pub fn connect<C>(
        config: &ClientConfig,
        connector: &C,
    ) -> Result<(Self, mpsc::Receiver<SessionItem>), SessionError>
    where
        C: TransportConnector + ?Sized,
    {
        let target = config.connection_target()?;
        tracing::info!(url = %target, "Connecting to Okotoki stream");

        let link = connector.connect(target);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (message_tx, message_rx) = mpsc::channel(config.message_buffer.max(1));
        let state = Arc::new(RwLock::new(SessionState::Connecting));

        let session = Session::new(
            config.credentials.clone(),
            StreamCodec::new(config.wire_format()),
            KeepaliveTimer::new(KeepaliveConfig::new(config.keepalive_interval)),
            link,
            command_rx,
            message_tx,
            Arc::clone(&state),
            DebugLog::new(config.debug),
        );
        tokio::spawn(session.run());

        Ok((
            Self {
                commands: command_tx,
                state,
            },
            message_rx,
        ))
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Request subscriptions.
    ///
    /// Before the first authentication the batch is queued; afterwards it is
    /// merged into the active set and the full set is sent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has ended.
    pub async fn subscribe(&self, subscriptions: Vec<Subscription>) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::Subscribe(subscriptions))
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Subscribe to coin index prices.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has ended.
    pub async fn index<I, S>(&self, coins: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe(coins.into_iter().map(|coin| subscription::index(coin)).collect())
            .await
    }

    /// Subscribe to market prices.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has ended.
    pub async fn price<I, S>(&self, markets: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = (Exchange, S)>,
        S: Into<String>,
    {
        self.subscribe(
            markets
                .into_iter()
                .map(|(exchange, symbol)| subscription::price(exchange, symbol))
                .collect(),
        )
        .await
    }

    /// Subscribe to trade volume histograms.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has ended.
    pub async fn trade_volume<I, S>(&self, markets: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = (Exchange, S)>,
        S: Into<String>,
    {
        self.subscribe(
            markets
                .into_iter()
                .map(|(exchange, symbol)| subscription::trade_volume(exchange, symbol))
                .collect(),
        )
        .await
    }

    /// Subscribe to large trades and liquidations.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has ended.
    pub async fn trade_and_liquidation<I, S>(
        &self,
        markets: I,
        options: &TradeSubscriptionOptions,
    ) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = (Exchange, S)>,
        S: Into<String>,
    {
        self.subscribe(
            markets
                .into_iter()
                .map(|(exchange, symbol)| {
                    subscription::large_trades(exchange, symbol, options.clone())
                })
                .collect(),
        )
        .await
    }

    /// Subscribe to aggregated order books.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has ended.
    pub async fn order_book<I, S>(
        &self,
        markets: I,
        options: &OrderBookSubscriptionOptions,
    ) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = (Exchange, S)>,
        S: Into<String>,
    {
        self.subscribe(
            markets
                .into_iter()
                .map(|(exchange, symbol)| subscription::order_book(exchange, symbol, options.clone()))
                .collect(),
        )
        .await
    }

    /// Subscribe to price-leveled trade volume.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has ended.
    pub async fn leveled_trade_volume<I, S>(
        &self,
        markets: I,
        options: &LeveledTradeVolumeSubscriptionOptions,
    ) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = (Exchange, S)>,
        S: Into<String>,
    {
        self.subscribe(
            markets
                .into_iter()
                .map(|(exchange, symbol)| {
                    subscription::leveled_trade_volume(exchange, symbol, options.clone())
                })
                .collect(),
        )
        .await
    }

    /// Subscribe to candles.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has ended.
    pub async fn candles<I, S>(
        &self,
        markets: I,
        options: &subscription::CandlesSubscriptionOptions,
    ) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = (Exchange, S)>,
        S: Into<String>,
    {
        self.subscribe(
            markets
                .into_iter()
                .map(|(exchange, symbol)| subscription::candles(exchange, symbol, options.clone()))
                .collect(),
        )
        .await
    }

    /// Get a snapshot of the active subscription set.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has ended.
    pub async fn active_subscriptions(&self) -> Result<Vec<Subscription>, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::ActiveSubscriptions(reply_tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)
    }

    /// Drop the current socket and connect again.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has ended.
    pub async fn reconnect(&self) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::Reconnect)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Stop the session for good. Idempotent.
    pub async fn disconnect(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .commands
            .send(SessionCommand::Disconnect(done_tx))
            .await
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }
}
