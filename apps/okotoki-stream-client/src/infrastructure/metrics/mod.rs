//! Prometheus Metrics Module
//!
//! Session counters in Prometheus format.
//!
//! # Metrics
//!
//! - `okotoki_messages_received_total{format, message_type}`
//! - `okotoki_decode_errors_total{format}`
//! - `okotoki_messages_dropped_total`
//! - `okotoki_pings_sent_total`
//! - `okotoki_connection_events_total{event}`
//! - `okotoki_subscribe_frames_sent_total`
//! - `okotoki_active_subscriptions`
//!
//! Recording is a no-op until a recorder is installed, so library users who
//! never call [`init_metrics`] pay nothing.

use std::net::SocketAddr;
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::infrastructure::okotoki::codec::WireFormat;

static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// Port 0 disables metrics. Calling again after a successful install is a
/// no-op. Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns an error if the recorder or the listener cannot be installed.
pub fn init_metrics(port: u16) -> Result<Option<SocketAddr>, BuildError> {
    if port == 0 {
        return Ok(None);
    }
    if let Some(addr) = INSTALLED.get() {
        return Ok(Some(*addr));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();

    Ok(Some(*INSTALLED.get_or_init(|| addr)))
}

fn register_metrics() {
    describe_counter!(
        "okotoki_messages_received_total",
        "Inbound messages decoded, by data plane and message type"
    );
    describe_counter!(
        "okotoki_decode_errors_total",
        "Inbound frames that failed to decode"
    );
    describe_counter!(
        "okotoki_messages_dropped_total",
        "Inbound items dropped because the caller's buffer was full"
    );
    describe_counter!("okotoki_pings_sent_total", "Keepalive pings sent");
    describe_counter!(
        "okotoki_connection_events_total",
        "Socket opens and closes seen by the session"
    );
    describe_counter!(
        "okotoki_subscribe_frames_sent_total",
        "Subscribe frames sent"
    );
    describe_gauge!(
        "okotoki_active_subscriptions",
        "Subscriptions in the active set"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Socket lifecycle label.
#[derive(Debug, Clone, Copy)]
pub enum ConnectionEvent {
    /// Socket opened.
    Open,
    /// Socket closed.
    Close,
}

impl ConnectionEvent {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
        }
    }
}

/// Record a decoded inbound message.
pub fn record_message_received(format: WireFormat, message_type: &'static str) {
    counter!(
        "okotoki_messages_received_total",
        "format" => format.as_str(),
        "message_type" => message_type
    )
    .increment(1);
}

/// Record a frame that failed to decode.
pub fn record_decode_error(format: WireFormat) {
    counter!("okotoki_decode_errors_total", "format" => format.as_str()).increment(1);
}

/// Record an item dropped on a full caller buffer.
pub fn record_message_dropped() {
    counter!("okotoki_messages_dropped_total").increment(1);
}

/// Record a keepalive ping.
pub fn record_ping_sent() {
    counter!("okotoki_pings_sent_total").increment(1);
}

/// Record a socket open or close.
pub fn record_connection_event(event: ConnectionEvent) {
    counter!("okotoki_connection_events_total", "event" => event.as_str()).increment(1);
}

/// Record a subscribe frame and the size of the set it carried.
#[allow(clippy::cast_precision_loss)]
pub fn record_subscribe_sent(active: usize) {
    counter!("okotoki_subscribe_frames_sent_total").increment(1);
    gauge!("okotoki_active_subscriptions").set(active as f64);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_event_as_str() {
        assert_eq!(ConnectionEvent::Open.as_str(), "open");
        assert_eq!(ConnectionEvent::Close.as_str(), "close");
    }

    #[test]
    fn disabled_port_installs_nothing() {
        assert_eq!(init_metrics(0).unwrap(), None);
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_message_received(WireFormat::Json, "pong");
        record_decode_error(WireFormat::Binary);
        record_message_dropped();
        record_ping_sent();
        record_connection_event(ConnectionEvent::Open);
        record_subscribe_sent(3);
    }
}
