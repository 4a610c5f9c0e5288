//! Okotoki Stream Adapters
//!
//! Client for the Okotoki market data API:
//!
//! - **Session**: auth, subscription replay and keepalive over one socket
//! - **Codec**: JSON single-key frames or Avro binary frames
//! - **Transport**: auto-reconnecting WebSocket
//! - **REST**: coin and market lookups

pub mod client;
pub mod codec;
pub mod keepalive;
pub mod messages;
pub mod reconnect;
pub mod rest;
pub mod schema;
pub mod session;
pub mod transport;

pub use client::StreamClient;
pub use codec::{CodecError, StreamCodec, WireFormat};
pub use keepalive::{KeepaliveConfig, KeepaliveTimer, MIN_KEEPALIVE_INTERVAL};
pub use messages::*;
pub use reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
pub use rest::{RestClient, RestError};
pub use schema::BinaryDecoder;
pub use session::{SessionError, SessionItem, SessionState};
pub use transport::WsConnector;
