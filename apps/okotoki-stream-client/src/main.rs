//! Okotoki Stream Client Demo
//!
//! Connects to the Okotoki stream, subscribes and logs every message until
//! interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin okotoki-stream-client
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `OKOTOKI_KEY`: API key
//! - `OKOTOKI_SECRET`: API secret
//!
//! ## Optional
//! - `OKOTOKI_WS_URL`: Socket endpoint (default: wss://api-eu.okotoki.com/ws)
//! - `OKOTOKI_REST_URL`: REST base (default: <https://api-eu.okotoki.com>)
//! - `OKOTOKI_USE_BINARY`: Use the Avro data plane (default: false)
//! - `OKOTOKI_DEBUG`: Log every frame (default: false)
//! - `OKOTOKI_SUBSCRIPTIONS`: JSON array of subscriptions (default: sample set)
//! - `OKOTOKI_METRICS_PORT`: Prometheus listener port, 0 = off (default: 0)
//! - `OTEL_ENABLED`: Export traces over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use okotoki_stream_client::domain::market::Exchange;
use okotoki_stream_client::domain::subscription::{
    CandlesSubscriptionOptions, Subscription, TradeSubscriptionOptions, candles, index,
    large_trades, price,
};
use okotoki_stream_client::infrastructure::config::ClientConfig;
use okotoki_stream_client::infrastructure::okotoki::{
    InboundMessage, RestClient, SessionItem, StreamClient, WsConnector,
};
use okotoki_stream_client::infrastructure::{metrics, telemetry};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Okotoki stream client");

    let config = ClientConfig::from_env()?;
    log_config(&config);

    if let Some(addr) = metrics::init_metrics(config.metrics_port)? {
        tracing::info!(addr = %addr, "Prometheus metrics listening");
    }

    let subscriptions = subscriptions_from_env()?;
    log_supported_coins(&config).await;

    let connector = WsConnector::new(config.transport.clone());
    let (client, messages) = StreamClient::connect(&config, &connector)?;
    client.subscribe(subscriptions).await?;

    let shutdown_token = CancellationToken::new();
    let consumer = tokio::spawn(consume_messages(messages, shutdown_token.clone()));

    await_shutdown(shutdown_token).await;

    client.disconnect().await;
    let _ = consumer.await;

    tracing::info!("Okotoki stream client stopped");
    Ok(())
}

/// Log every message until shutdown or the session ends.
async fn consume_messages(mut messages: mpsc::Receiver<SessionItem>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            item = messages.recv() => {
                match item {
                    Some(Ok(InboundMessage::Error(error))) => {
                        tracing::error!(
                            code = %error.error_code,
                            message = %error.error_message,
                            "Server rejected request"
                        );
                    }
                    Some(Ok(InboundMessage::BinarySchema(_))) => {
                        tracing::info!("Binary schema received");
                    }
                    Some(Ok(message)) => {
                        tracing::info!(message_type = message.type_name(), message = ?message, "Message");
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Undecodable frame");
                    }
                    None => {
                        tracing::warn!("Session ended");
                        break;
                    }
                }
            }
        }
    }
}

/// Read `OKOTOKI_SUBSCRIPTIONS`, or fall back to a sample set.
fn subscriptions_from_env() -> Result<Vec<Subscription>, serde_json::Error> {
    match std::env::var("OKOTOKI_SUBSCRIPTIONS") {
        Ok(json) if !json.trim().is_empty() => serde_json::from_str(&json),
        _ => Ok(sample_subscriptions()),
    }
}

fn sample_subscriptions() -> Vec<Subscription> {
    vec![
        index("BTC"),
        price(Exchange::Binance, "BTCUSDT"),
        large_trades(
            Exchange::Bitmex,
            "XBTUSD",
            TradeSubscriptionOptions {
                threshold_trades: 50_000.0,
                limit_trades: 30,
                threshold_liquidations: Some(0.0),
                limit_liquidations: Some(30),
            },
        ),
        candles(
            Exchange::Binance,
            "BTCUSDT",
            CandlesSubscriptionOptions {
                interval: 60_000,
                window: 3_600_000,
                metrics: vec!["open".to_string(), "low".to_string(), "high".to_string()],
            },
        ),
    ]
}

/// Log the coin list from the REST API. Failures are not fatal.
async fn log_supported_coins(config: &ClientConfig) {
    let rest = match RestClient::new(config.rest_url.clone()) {
        Ok(rest) => rest,
        Err(e) => {
            tracing::warn!(error = %e, "REST client unavailable");
            return;
        }
    };

    match rest.supported_coins().await {
        Ok(coins) => tracing::info!(count = coins.len(), coins = ?coins, "Supported coins"),
        Err(e) => tracing::warn!(error = %e, "Failed to fetch supported coins"),
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        ws_url = %config.ws_url,
        rest_url = %config.rest_url,
        format = config.wire_format().as_str(),
        debug = config.debug,
        keepalive_secs = config.keepalive_interval.as_secs(),
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        connection_timeout_ms = config.transport.connection_timeout.as_millis(),
        min_reconnect_delay_ms = config.transport.min_reconnect_delay.as_millis(),
        max_reconnect_delay_ms = config.transport.max_reconnect_delay.as_millis(),
        max_retries = config.transport.max_retries,
        "Transport settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, disconnecting");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, disconnecting");
        }
    }

    shutdown_token.cancel();
}
