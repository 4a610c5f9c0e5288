#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Okotoki Stream Client - Market Data Session
//!
//! A client for the Okotoki real-time market data API. Keeps one
//! auto-reconnecting WebSocket session alive, authenticates, replays the
//! subscription set after every reconnect and decodes JSON or Avro frames
//! into one typed message stream.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Market data reference types and subscription rules
//!   - `market`: Exchanges and market descriptors
//!   - `subscription`: Subscriptions, identity merge, registry
//!
//! - **Application**: Port definitions
//!   - `ports`: Transport connector, handle and events
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `okotoki`: Session, codec, WebSocket transport, REST client
//!   - `config`: Environment configuration
//!   - `telemetry`: Tracing subscriber and debug switch
//!   - `metrics`: Prometheus counters
//!
//! # Data Flow
//!
//! ```text
//!                    ┌──────────────┐  events   ┌───────────┐  Result<InboundMessage>
//! Okotoki WS ◄──────►│  Transport   │──────────►│  Session  │──────────────────────► caller
//!                    └──────────────┘◄──────────└───────────┘◄──── StreamClient
//!                                      frames                 commands
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Market reference data and subscription rules.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market::{Exchange, Market, MarketState};
pub use domain::subscription::{Subscription, SubscriptionRegistry, merge_subscriptions};

// Ports
pub use application::ports::{
    Frame, TransportConnector, TransportError, TransportEvent, TransportHandle, TransportLink,
};

// Infrastructure config
pub use infrastructure::config::{ClientConfig, ConfigError, Credentials, TransportSettings};

// Client
pub use infrastructure::okotoki::{
    InboundMessage, OutboundMessage, RestClient, RestError, SessionError, SessionState,
    StreamClient, WsConnector,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{DebugLog, TelemetryConfig, TelemetryGuard, init as init_telemetry};
