//! Client Configuration Settings
//!
//! Configuration types for the stream client, loaded from environment
//! variables or assembled with the `with_*` builders.

use std::time::Duration;

use url::Url;

use crate::infrastructure::okotoki::codec::WireFormat;

/// Default socket endpoint.
pub const DEFAULT_WS_URL: &str = "wss://api-eu.okotoki.com/ws";

/// Default capacity of the caller's message buffer.
pub const DEFAULT_MESSAGE_BUFFER: usize = 4096;

/// Default REST base URL.
pub const DEFAULT_REST_URL: &str = "https://api-eu.okotoki.com";

/// Okotoki API credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API secret.
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Socket transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Time allowed for one connection attempt.
    pub connection_timeout: Duration,
    /// Backoff delay before the first retry.
    pub min_reconnect_delay: Duration,
    /// Upper bound of the backoff delay.
    pub max_reconnect_delay: Duration,
    /// Retries before giving up (0 = unlimited).
    pub max_retries: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_millis(4000),
            min_reconnect_delay: Duration::from_millis(4000),
            max_reconnect_delay: Duration::from_millis(10_000),
            max_retries: 0, // Unlimited
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API credentials.
    pub credentials: Credentials,
    /// Socket endpoint, without the `useBinary` query.
    pub ws_url: String,
    /// REST base URL.
    pub rest_url: String,
    /// Request the binary data plane.
    pub use_binary: bool,
    /// Emit verbose per-frame session logs.
    pub debug: bool,
    /// Idle time before a keepalive ping.
    pub keepalive_interval: Duration,
    /// Capacity of the caller's message buffer. Items arriving while it is
    /// full are dropped.
    pub message_buffer: usize,
    /// Socket transport settings.
    pub transport: TransportSettings,
    /// Prometheus listener port (0 = disabled).
    pub metrics_port: u16,
}

impl ClientConfig {
    /// Create a configuration with default endpoints and timings.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            ws_url: DEFAULT_WS_URL.to_string(),
            rest_url: DEFAULT_REST_URL.to_string(),
            use_binary: false,
            debug: false,
            keepalive_interval: Duration::from_secs(60),
            message_buffer: DEFAULT_MESSAGE_BUFFER,
            transport: TransportSettings::default(),
            metrics_port: 0,
        }
    }

    /// Set the socket endpoint.
    #[must_use]
    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    /// Set the REST base URL.
    #[must_use]
    pub fn with_rest_url(mut self, url: impl Into<String>) -> Self {
        self.rest_url = url.into();
        self
    }

    /// Select the binary data plane.
    #[must_use]
    pub const fn with_binary(mut self, use_binary: bool) -> Self {
        self.use_binary = use_binary;
        self
    }

    /// Enable verbose session logs.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the keepalive period. Periods under one second are raised to one
    /// second by the keepalive timer.
    #[must_use]
    pub const fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set the message buffer capacity (at least 1).
    #[must_use]
    pub fn with_message_buffer(mut self, capacity: usize) -> Self {
        self.message_buffer = capacity.max(1);
        self
    }

    /// Set the transport settings.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportSettings) -> Self {
        self.transport = transport;
        self
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are missing or empty, if an
    /// endpoint is not a valid URL, or if the keepalive interval is not a
    /// positive number of seconds.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OKOTOKI_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OKOTOKI_KEY".to_string()))?;

        let api_secret = std::env::var("OKOTOKI_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("OKOTOKI_SECRET".to_string()))?;

        if api_key.is_empty() {
            return Err(ConfigError::EmptyValue("OKOTOKI_KEY".to_string()));
        }

        if api_secret.is_empty() {
            return Err(ConfigError::EmptyValue("OKOTOKI_SECRET".to_string()));
        }

        let defaults = Self::new(Credentials::new(api_key, api_secret));
        let transport_defaults = TransportSettings::default();

        let transport = TransportSettings {
            connection_timeout: parse_env_duration_millis(
                "OKOTOKI_CONNECTION_TIMEOUT_MS",
                transport_defaults.connection_timeout,
            ),
            min_reconnect_delay: parse_env_duration_millis(
                "OKOTOKI_MIN_RECONNECT_DELAY_MS",
                transport_defaults.min_reconnect_delay,
            ),
            max_reconnect_delay: parse_env_duration_millis(
                "OKOTOKI_MAX_RECONNECT_DELAY_MS",
                transport_defaults.max_reconnect_delay,
            ),
            max_retries: parse_env_u32("OKOTOKI_MAX_RETRIES", transport_defaults.max_retries),
        };

        let config = Self {
            ws_url: std::env::var("OKOTOKI_WS_URL").unwrap_or(defaults.ws_url),
            rest_url: std::env::var("OKOTOKI_REST_URL").unwrap_or(defaults.rest_url),
            use_binary: parse_env_bool("OKOTOKI_USE_BINARY", defaults.use_binary),
            debug: parse_env_bool("OKOTOKI_DEBUG", defaults.debug),
            keepalive_interval: parse_keepalive_secs(
                "OKOTOKI_KEEPALIVE_INTERVAL_SECS",
                std::env::var("OKOTOKI_KEEPALIVE_INTERVAL_SECS").ok().as_deref(),
                defaults.keepalive_interval,
            )?,
            message_buffer: parse_env_usize("OKOTOKI_MESSAGE_BUFFER", defaults.message_buffer)
                .max(1),
            transport,
            metrics_port: parse_env_u16("OKOTOKI_METRICS_PORT", defaults.metrics_port),
            credentials: defaults.credentials,
        };

        config.connection_target()?;
        Url::parse(&config.rest_url).map_err(|e| ConfigError::InvalidUrl {
            key: "OKOTOKI_REST_URL".to_string(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    /// Get the negotiated data plane.
    #[must_use]
    pub const fn wire_format(&self) -> WireFormat {
        WireFormat::from_use_binary(self.use_binary)
    }

    /// Build the socket target: `{ws_url}?useBinary={true|false}`.
    ///
    /// # Errors
    ///
    /// Returns an error if `ws_url` is not a valid URL.
    pub fn connection_target(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.ws_url).map_err(|e| ConfigError::InvalidUrl {
            key: "OKOTOKI_WS_URL".to_string(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("useBinary", if self.use_binary { "true" } else { "false" });
        Ok(url)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Endpoint is not a valid URL.
    #[error("invalid URL in {key}: {reason}")]
    InvalidUrl {
        /// Setting that holds the URL.
        key: String,
        /// Parser message.
        reason: String,
    },
    /// Setting has an unusable value.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_keepalive_secs(
    key: &str,
    raw: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "must be at least 1 second".to_string(),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new(Credentials::new("key", "secret"))
    }

    #[test]
    fn credentials_redacted_debug() {
        let creds = Credentials::new("key123", "secret456");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("key123"));
        assert!(!debug.contains("secret456"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn transport_settings_defaults() {
        let settings = TransportSettings::default();
        assert_eq!(settings.connection_timeout, Duration::from_millis(4000));
        assert_eq!(settings.min_reconnect_delay, Duration::from_millis(4000));
        assert_eq!(settings.max_reconnect_delay, Duration::from_millis(10_000));
        assert_eq!(settings.max_retries, 0);
    }

    #[test]
    fn client_config_defaults() {
        let config = config();
        assert_eq!(config.ws_url, DEFAULT_WS_URL);
        assert_eq!(config.rest_url, DEFAULT_REST_URL);
        assert!(!config.use_binary);
        assert!(!config.debug);
        assert_eq!(config.keepalive_interval, Duration::from_secs(60));
        assert_eq!(config.metrics_port, 0);
        assert_eq!(config.message_buffer, DEFAULT_MESSAGE_BUFFER);
    }

    #[test]
    fn message_buffer_is_at_least_one() {
        assert_eq!(config().with_message_buffer(0).message_buffer, 1);
        assert_eq!(config().with_message_buffer(16).message_buffer, 16);
    }

    #[test]
    fn connection_target_carries_format_flag() {
        let json = config().connection_target().unwrap();
        assert_eq!(json.as_str(), "wss://api-eu.okotoki.com/ws?useBinary=false");

        let binary = config().with_binary(true).connection_target().unwrap();
        assert_eq!(binary.as_str(), "wss://api-eu.okotoki.com/ws?useBinary=true");
        assert_eq!(config().with_binary(true).wire_format(), WireFormat::Binary);
    }

    #[test]
    fn keepalive_secs_parsing() {
        let key = "OKOTOKI_KEEPALIVE_INTERVAL_SECS";
        let default = Duration::from_secs(60);

        assert_eq!(parse_keepalive_secs(key, None, default).unwrap(), default);
        assert_eq!(
            parse_keepalive_secs(key, Some(" 15 "), default).unwrap(),
            Duration::from_secs(15)
        );
        assert!(matches!(
            parse_keepalive_secs(key, Some("0"), default),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_keepalive_secs(key, Some("soon"), default),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn connection_target_rejects_garbage() {
        let err = config().with_ws_url("not a url").connection_target().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }
}
