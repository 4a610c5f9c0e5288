//! Okotoki WebSocket Message Types
//!
//! Wire format types for the Okotoki stream. Inbound messages are normalized
//! records tagged by a `type` field regardless of the data plane they came
//! from (see [`super::codec`]); outbound messages are JSON objects tagged the
//! same way.
//!
//! # Message Types
//!
//! ## Control Messages
//! - `pong`: Keepalive reply
//! - `subscribed`: Subscription acknowledgement
//! - `error`: Server-reported application error
//! - `binarySchema`: Avro schema for the binary data plane
//!
//! ## Data Messages
//! Tagged with the fully-qualified model name (`com.okotoki.model.Trade`,
//! ...). The short names (`trade`, ...) are accepted as aliases.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::market::Exchange;
use crate::domain::subscription::Subscription;

/// Namespace of the data record types.
pub const MODEL_NAMESPACE: &str = "com.okotoki.model";

// =============================================================================
// Inbound Messages
// =============================================================================

/// Normalized inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// Keepalive reply.
    #[serde(rename = "pong")]
    Pong,
    /// Subscription acknowledgement.
    #[serde(rename = "subscribed")]
    Subscribed(SubscribedMessage),
    /// Server-reported error.
    #[serde(rename = "error")]
    Error(ErrorMessage),
    /// Schema bootstrap for the binary data plane.
    #[serde(rename = "binarySchema")]
    BinarySchema(BinarySchemaMessage),
    /// Trade or liquidation.
    #[serde(rename = "com.okotoki.model.Trade", alias = "trade")]
    Trade(TradeMessage),
    /// Coin index price.
    #[serde(rename = "com.okotoki.model.Index", alias = "index")]
    Index(IndexMessage),
    /// Market price update.
    #[serde(rename = "com.okotoki.model.Price", alias = "price")]
    Price(PriceMessage),
    /// Trade volume histograms.
    #[serde(rename = "com.okotoki.model.TradeVolume", alias = "tradeVolume")]
    TradeVolume(TradeVolumeMessage),
    /// Order book change.
    #[serde(rename = "com.okotoki.model.BookChange", alias = "bookChange")]
    BookChange(BookChangeMessage),
    /// Price-leveled trade volume.
    #[serde(
        rename = "com.okotoki.model.LeveledTradeVolume",
        alias = "leveledTradeVolume"
    )]
    LeveledTradeVolume(LeveledTradeVolumeMessage),
}

impl InboundMessage {
    /// Get the `type` tag of this message.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Pong => "pong",
            Self::Subscribed(_) => "subscribed",
            Self::Error(_) => "error",
            Self::BinarySchema(_) => "binarySchema",
            Self::Trade(_) => "com.okotoki.model.Trade",
            Self::Index(_) => "com.okotoki.model.Index",
            Self::Price(_) => "com.okotoki.model.Price",
            Self::TradeVolume(_) => "com.okotoki.model.TradeVolume",
            Self::BookChange(_) => "com.okotoki.model.BookChange",
            Self::LeveledTradeVolume(_) => "com.okotoki.model.LeveledTradeVolume",
        }
    }

    /// Check if this is a control message rather than market data.
    #[must_use]
    pub const fn is_control(&self) -> bool {
        matches!(
            self,
            Self::Pong | Self::Subscribed(_) | Self::Error(_) | Self::BinarySchema(_)
        )
    }
}

/// Subscription acknowledgement.
///
/// Entries are kept as raw JSON so an ack naming a venue or kind this client
/// does not model still decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribedMessage {
    /// Subscriptions the server is now streaming.
    #[serde(default)]
    pub subscriptions: Vec<serde_json::Value>,
}

/// Server-reported application error.
///
/// # Wire Format (JSON)
/// ```json
/// {"error": {"errorCode": "invalidSubscription", "errorMessage": "..."}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    /// Machine-readable code.
    pub error_code: String,
    /// Human-readable description.
    pub error_message: String,
}

/// Avro schema pushed by the server before any binary frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinarySchemaMessage {
    /// Schema definition in Avro JSON form.
    pub schema: serde_json::Value,
}

/// Whether a trade was a regular fill or a forced liquidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeKind {
    /// Regular trade.
    Trade,
    /// Liquidation.
    Liquidation,
}

/// Aggressor side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buyer was the taker.
    Buy,
    /// Seller was the taker.
    Sell,
    /// Exchange does not report the side.
    Unknown,
}

/// Trade or liquidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeMessage {
    /// Trade or liquidation.
    pub kind: TradeKind,
    /// Venue.
    pub exchange: Exchange,
    /// Exchange-native symbol.
    pub symbol: String,
    /// Exchange trade id.
    pub id: String,
    /// Trade time.
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Fill price.
    pub price: f64,
    /// Size in base units.
    pub amount: f64,
    /// Size in quote units.
    pub amount_in_quote_units: f64,
    /// Aggressor side.
    pub side: Side,
    /// Whether this is a liquidation.
    pub is_liquidation: bool,
}

/// Coin index price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMessage {
    /// Coin ticker.
    pub coin: String,
    /// Index price.
    pub price: f64,
}

/// Market price update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMessage {
    /// Venue.
    pub exchange: Exchange,
    /// Exchange-native symbol.
    pub symbol: String,
    /// Update time.
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Last price.
    pub price: f64,
}

/// Buy/sell volume histogram over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeHistogram {
    /// Bucket width in milliseconds.
    pub interval: u64,
    /// Window length in milliseconds.
    pub window: u64,
    /// Earliest bucket start, epoch milliseconds.
    pub earliest_timestamp: i64,
    /// Latest bucket start, epoch milliseconds.
    pub latest_timestamp: i64,
    /// Start of the bucket currently filling.
    #[serde(with = "timestamp")]
    pub latest_interval_timestamp: DateTime<Utc>,
    /// Buy volume per bucket, oldest first.
    pub volumes_buy: Vec<f64>,
    /// Sell volume per bucket, oldest first.
    pub volumes_sell: Vec<f64>,
}

/// Trade volume of a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeVolumeMessage {
    /// Venue.
    pub exchange: Exchange,
    /// Exchange-native symbol.
    pub symbol: String,
    /// One histogram per configured window.
    pub volumes: Vec<VolumeHistogram>,
}

/// Aggregated price level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price.
    pub price: f64,
    /// Size at this level. Zero removes the level.
    pub amount: f64,
}

/// Order book change.
///
/// `idx` increases monotonically per market; a snapshot replaces the book,
/// otherwise levels are applied as deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookChangeMessage {
    /// Venue.
    pub exchange: Exchange,
    /// Exchange-native symbol.
    pub symbol: String,
    /// Change time, epoch milliseconds.
    pub timestamp: i64,
    /// Sequence index.
    pub idx: u64,
    /// Whether this change is a full snapshot.
    pub is_snapshot: bool,
    /// Bid levels, best first.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best first.
    pub asks: Vec<PriceLevel>,
}

/// Trade volume bucketed by price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeveledTradeVolumeMessage {
    /// Venue name as sent by the server.
    pub exchange: String,
    /// Exchange-native symbol.
    pub symbol: String,
    /// Update time, epoch milliseconds.
    pub timestamp: i64,
    /// Aggregation interval in milliseconds.
    pub interval: u64,
    /// Sequence index.
    pub idx: u64,
    /// Whether this update is a full snapshot.
    pub is_snapshot: bool,
    /// Buy volume per price level.
    pub levels_buy: Vec<PriceLevel>,
    /// Sell volume per price level.
    pub levels_sell: Vec<PriceLevel>,
}

// =============================================================================
// Outbound Messages
// =============================================================================

/// Outbound command.
///
/// # Wire Format (JSON)
/// ```json
/// {"type": "subscribe", "subscriptions": [{"kind": "index", "coin": "BTC"}]}
/// {"type": "ping"}
/// {"type": "auth", "key": "...", "secret": "..."}
/// ```
#[derive(Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Replace the server-side subscription set.
    Subscribe {
        /// Full desired set, in order.
        subscriptions: Vec<Subscription>,
    },
    /// Keepalive request.
    Ping,
    /// Authenticate the connection.
    Auth {
        /// API key.
        key: String,
        /// API secret.
        secret: String,
    },
}

impl OutboundMessage {
    /// Get the `type` tag of this message.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Ping => "ping",
            Self::Auth { .. } => "auth",
        }
    }
}

impl fmt::Debug for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscribe { subscriptions } => f
                .debug_struct("Subscribe")
                .field("subscriptions", subscriptions)
                .finish(),
            Self::Ping => f.write_str("Ping"),
            Self::Auth { .. } => f
                .debug_struct("Auth")
                .field("key", &"[REDACTED]")
                .field("secret", &"[REDACTED]")
                .finish(),
        }
    }
}

// =============================================================================
// Timestamps
// =============================================================================

/// Timestamps that arrive either as RFC 3339 text (JSON data plane) or as
/// epoch milliseconds (Avro `long`). Serialized back as RFC 3339.
mod timestamp {
    use std::fmt;

    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }

    struct TimestampVisitor;

    impl Visitor<'_> for TimestampVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an RFC 3339 timestamp or epoch milliseconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            DateTime::parse_from_rfc3339(v)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            DateTime::from_timestamp_millis(v)
                .ok_or_else(|| E::custom(format!("timestamp out of range: {v}")))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            let millis = i64::try_from(v).map_err(E::custom)?;
            self.visit_i64(millis)
        }

        #[allow(clippy::cast_possible_truncation)]
        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            self.visit_i64(v.round() as i64)
        }
    }
}
