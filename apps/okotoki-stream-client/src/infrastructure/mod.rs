//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Okotoki session, codec, WebSocket transport and REST client.
pub mod okotoki;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging, OpenTelemetry tracing and the debug log switch.
pub mod telemetry;
