//! Configuration Module
//!
//! Configuration loading for the stream client.

mod settings;

pub use settings::{
    ClientConfig, ConfigError, Credentials, DEFAULT_REST_URL, DEFAULT_WS_URL, TransportSettings,
};
