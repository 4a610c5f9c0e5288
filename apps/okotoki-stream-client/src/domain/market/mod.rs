//! Market Reference Data
//!
//! Exchanges and market descriptors as published by the Okotoki REST API.
//! These are read-only values: the session never mutates them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Exchange
// =============================================================================

/// Trading venue supported by the stream.
///
/// Derivative and spot flavours of the same venue are separate exchanges and
/// carry a circled suffix on the wire (`binance-Ⓕ` for futures, `-Ⓓ` for
/// delivery/inverse, `-Ⓢ` for swaps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Exchange {
    /// Binance spot.
    #[serde(rename = "binance")]
    Binance,
    /// Binance coin-margined delivery.
    #[serde(rename = "binance-Ⓓ")]
    BinanceD,
    /// Binance USDT futures.
    #[serde(rename = "binance-Ⓕ")]
    BinanceF,
    /// Bitfinex spot.
    #[serde(rename = "bitfinex")]
    Bitfinex,
    /// Bitfinex derivatives.
    #[serde(rename = "bitfinex-Ⓓ")]
    BitfinexD,
    /// `BitMEX`.
    #[serde(rename = "bitmex")]
    Bitmex,
    /// Bitstamp.
    #[serde(rename = "bitstamp")]
    Bitstamp,
    /// Bybit.
    #[serde(rename = "bybit")]
    Bybit,
    /// Bybit inverse.
    #[serde(rename = "bybit-Ⓓ")]
    BybitD,
    /// Bybit spot.
    #[serde(rename = "bybit-Ⓢ")]
    BybitS,
    /// Coinbase.
    #[serde(rename = "coinbase")]
    Coinbase,
    /// Deribit.
    #[serde(rename = "deribit")]
    Deribit,
    /// Huobi spot.
    #[serde(rename = "huobi")]
    Huobi,
    /// Huobi futures.
    #[serde(rename = "huobi-Ⓕ")]
    HuobiF,
    /// Huobi coin-margined delivery.
    #[serde(rename = "huobi-Ⓓ")]
    HuobiD,
    /// Huobi swaps.
    #[serde(rename = "huobi-Ⓢ")]
    HuobiS,
    /// Kraken.
    #[serde(rename = "kraken")]
    Kraken,
    /// OKEx spot.
    #[serde(rename = "okex")]
    Okex,
    /// OKEx futures.
    #[serde(rename = "okex-Ⓕ")]
    OkexF,
    /// OKEx delivery.
    #[serde(rename = "okex-Ⓓ")]
    OkexD,
}

impl Exchange {
    /// Every supported exchange, in wire order.
    pub const ALL: [Self; 20] = [
        Self::Binance,
        Self::BinanceD,
        Self::BinanceF,
        Self::Bitfinex,
        Self::BitfinexD,
        Self::Bitmex,
        Self::Bitstamp,
        Self::Bybit,
        Self::BybitD,
        Self::BybitS,
        Self::Coinbase,
        Self::Deribit,
        Self::Huobi,
        Self::HuobiF,
        Self::HuobiD,
        Self::HuobiS,
        Self::Kraken,
        Self::Okex,
        Self::OkexF,
        Self::OkexD,
    ];

    /// Get the wire name of the exchange.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::BinanceD => "binance-Ⓓ",
            Self::BinanceF => "binance-Ⓕ",
            Self::Bitfinex => "bitfinex",
            Self::BitfinexD => "bitfinex-Ⓓ",
            Self::Bitmex => "bitmex",
            Self::Bitstamp => "bitstamp",
            Self::Bybit => "bybit",
            Self::BybitD => "bybit-Ⓓ",
            Self::BybitS => "bybit-Ⓢ",
            Self::Coinbase => "coinbase",
            Self::Deribit => "deribit",
            Self::Huobi => "huobi",
            Self::HuobiF => "huobi-Ⓕ",
            Self::HuobiD => "huobi-Ⓓ",
            Self::HuobiS => "huobi-Ⓢ",
            Self::Kraken => "kraken",
            Self::Okex => "okex",
            Self::OkexF => "okex-Ⓕ",
            Self::OkexD => "okex-Ⓓ",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown exchange name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown exchange: {0}")]
pub struct UnknownExchange(pub String);

impl FromStr for Exchange {
    type Err = UnknownExchange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|exchange| exchange.as_str() == s)
            .ok_or_else(|| UnknownExchange(s.to_string()))
    }
}

// =============================================================================
// Market
// =============================================================================

/// Listing state of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketState {
    /// Streaming normally.
    Enabled,
    /// Temporarily not streamed.
    Disabled,
    /// Delisted by the exchange.
    Unlisted,
}

/// A single entry of a market's state history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEvent {
    /// State the market moved into.
    pub state: MarketState,
    /// When the transition happened.
    pub timestamp: DateTime<Utc>,
}

/// Market descriptor returned by `GET /markets/{COIN}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    /// Venue.
    pub exchange: Exchange,
    /// Exchange-native symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Market type as reported by the service (spot, perpetual, ...).
    pub market_type: String,
    /// Base asset as named by the exchange.
    pub base: String,
    /// Base asset, normalized across exchanges.
    pub base_normalized: String,
    /// Quote asset as named by the exchange.
    pub quote: String,
    /// Quote asset, normalized across exchanges.
    pub quote_normalized: String,
    /// Current listing state.
    pub state: MarketState,
    /// Last time the descriptor changed.
    pub updated_timestamp: DateTime<Utc>,
    /// Whether the market is available on the free plan.
    pub is_free: bool,
    /// Append-only history of state transitions, oldest first.
    #[serde(default)]
    pub state_history: Vec<StateEvent>,
}

impl Market {
    /// Check if the market is currently streamed.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self.state, MarketState::Enabled)
    }

    /// Get the most recent state transition, if any was recorded.
    #[must_use]
    pub fn last_transition(&self) -> Option<&StateEvent> {
        self.state_history.last()
    }
}
