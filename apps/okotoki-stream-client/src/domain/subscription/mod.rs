//! Subscription Management Types
//!
//! Domain types for the subscriptions a session asks the server to stream,
//! and the registry that reconciles them across reconnects.
//!
//! # Design
//!
//! The registry tracks:
//! - The active set: the caller's complete desired state, unique by identity
//! - Batches requested before the first authentication, in request order
//!
//! Every subscribe frame carries the whole active set, so replaying it after
//! a reconnect (or sending it twice) is idempotent on the server side.

mod builders;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::market::Exchange;

pub use builders::{
    candles, index, large_trades, leveled_trade_volume, order_book, price, trade_volume,
};

// =============================================================================
// Subscription Options
// =============================================================================

/// Options for large trades and liquidations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSubscriptionOptions {
    /// Minimum trade size, in quote units, to be streamed.
    pub threshold_trades: f64,
    /// Number of trades kept in the initial snapshot.
    pub limit_trades: u32,
    /// Minimum liquidation size, in quote units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_liquidations: Option<f64>,
    /// Number of liquidations kept in the initial snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_liquidations: Option<u32>,
}

/// Options for aggregated order book updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSubscriptionOptions {
    /// Price bucket size.
    pub step: f64,
    /// Update rate in milliseconds.
    pub rate: u64,
    /// Aggregation interval in milliseconds.
    pub interval: u64,
    /// History window in milliseconds.
    pub window: u64,
}

/// Options for price-leveled trade volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeveledTradeVolumeSubscriptionOptions {
    /// Aggregation interval in milliseconds.
    pub interval: u64,
    /// History window in milliseconds.
    pub window: u64,
    /// Price bucket size.
    pub step: f64,
}

/// Options for candles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlesSubscriptionOptions {
    /// Candle interval in milliseconds.
    pub interval: u64,
    /// History window in milliseconds.
    pub window: u64,
    /// Metrics to compute per candle (`open`, `high`, `low`, ...).
    pub metrics: Vec<String>,
}

// =============================================================================
// Subscription
// =============================================================================

/// A single stream the session asks the server for.
///
/// # Wire Format (JSON)
/// ```json
/// {"kind": "index", "coin": "BTC"}
/// {"kind": "largeTrades", "exchange": "binance", "symbol": "BTCUSDT",
///  "thresholdTrades": 50000, "limitTrades": 30}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Subscription {
    /// Cross-exchange index price of a coin.
    Index {
        /// Coin ticker, e.g. `BTC`.
        coin: String,
    },
    /// Last price of a market.
    Price {
        /// Venue.
        exchange: Exchange,
        /// Exchange-native symbol.
        symbol: String,
    },
    /// Rolling buy/sell volume of a market.
    TradeVolume {
        /// Venue.
        exchange: Exchange,
        /// Exchange-native symbol.
        symbol: String,
    },
    /// Trades and liquidations above a size threshold.
    LargeTrades {
        /// Venue.
        exchange: Exchange,
        /// Exchange-native symbol.
        symbol: String,
        /// Thresholds and snapshot limits.
        #[serde(flatten)]
        options: TradeSubscriptionOptions,
    },
    /// Aggregated order book.
    OrderBook {
        /// Venue.
        exchange: Exchange,
        /// Exchange-native symbol.
        symbol: String,
        /// Aggregation settings.
        #[serde(flatten)]
        options: OrderBookSubscriptionOptions,
    },
    /// Trade volume bucketed by price level.
    LeveledTradeVolume {
        /// Venue.
        exchange: Exchange,
        /// Exchange-native symbol.
        symbol: String,
        /// Aggregation settings.
        #[serde(flatten)]
        options: LeveledTradeVolumeSubscriptionOptions,
    },
    /// OHLC-style candles.
    Candles {
        /// Venue.
        exchange: Exchange,
        /// Exchange-native symbol.
        symbol: String,
        /// Candle settings.
        #[serde(flatten)]
        options: CandlesSubscriptionOptions,
    },
}

/// Discriminant of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    /// `index`
    Index,
    /// `price`
    Price,
    /// `tradeVolume`
    TradeVolume,
    /// `largeTrades`
    LargeTrades,
    /// `orderBook`
    OrderBook,
    /// `leveledTradeVolume`
    LeveledTradeVolume,
    /// `candles`
    Candles,
}

impl SubscriptionKind {
    /// Get the wire name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Price => "price",
            Self::TradeVolume => "tradeVolume",
            Self::LargeTrades => "largeTrades",
            Self::OrderBook => "orderBook",
            Self::LeveledTradeVolume => "leveledTradeVolume",
            Self::Candles => "candles",
        }
    }
}

/// The part of a subscription that decides uniqueness in the active set.
///
/// Options (thresholds, windows, steps) are not part of the key: two
/// subscriptions with the same key are the same stream with different
/// settings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// Coin-scoped stream.
    Coin {
        /// Subscription kind.
        kind: SubscriptionKind,
        /// Coin ticker.
        coin: String,
    },
    /// Market-scoped stream.
    Market {
        /// Subscription kind.
        kind: SubscriptionKind,
        /// Venue.
        exchange: Exchange,
        /// Exchange-native symbol.
        symbol: String,
    },
}

impl Subscription {
    /// Get the subscription kind.
    #[must_use]
    pub const fn kind(&self) -> SubscriptionKind {
        match self {
            Self::Index { .. } => SubscriptionKind::Index,
            Self::Price { .. } => SubscriptionKind::Price,
            Self::TradeVolume { .. } => SubscriptionKind::TradeVolume,
            Self::LargeTrades { .. } => SubscriptionKind::LargeTrades,
            Self::OrderBook { .. } => SubscriptionKind::OrderBook,
            Self::LeveledTradeVolume { .. } => SubscriptionKind::LeveledTradeVolume,
            Self::Candles { .. } => SubscriptionKind::Candles,
        }
    }

    /// Get the market this subscription targets, if it is market-scoped.
    #[must_use]
    pub fn market(&self) -> Option<(Exchange, &str)> {
        match self {
            Self::Index { .. } => None,
            Self::Price { exchange, symbol }
            | Self::TradeVolume { exchange, symbol }
            | Self::LargeTrades {
                exchange, symbol, ..
            }
            | Self::OrderBook {
                exchange, symbol, ..
            }
            | Self::LeveledTradeVolume {
                exchange, symbol, ..
            }
            | Self::Candles {
                exchange, symbol, ..
            } => Some((*exchange, symbol.as_str())),
        }
    }

    /// Get the identity key of this subscription.
    #[must_use]
    pub fn identity(&self) -> IdentityKey {
        let kind = self.kind();
        match self {
            Self::Index { coin } => IdentityKey::Coin {
                kind,
                coin: coin.clone(),
            },
            Self::Price { exchange, symbol }
            | Self::TradeVolume { exchange, symbol }
            | Self::LargeTrades {
                exchange, symbol, ..
            }
            | Self::OrderBook {
                exchange, symbol, ..
            }
            | Self::LeveledTradeVolume {
                exchange, symbol, ..
            }
            | Self::Candles {
                exchange, symbol, ..
            } => IdentityKey::Market {
                kind,
                exchange: *exchange,
                symbol: symbol.clone(),
            },
        }
    }
}

// =============================================================================
// Merge
// =============================================================================

/// Merge `incoming` into `current` by identity key.
///
/// Entries of `incoming` replace same-identity entries of `current` in place;
/// new identities are appended in arrival order. Duplicates inside `incoming`
/// resolve to the last one.
#[must_use]
pub fn merge_subscriptions(
    current: &[Subscription],
    incoming: impl IntoIterator<Item = Subscription>,
) -> Vec<Subscription> {
    let mut merged: Vec<Subscription> = current.to_vec();
    let mut positions: HashMap<IdentityKey, usize> = merged
        .iter()
        .enumerate()
        .map(|(pos, sub)| (sub.identity(), pos))
        .collect();

    for sub in incoming {
        let key = sub.identity();
        if let Some(&pos) = positions.get(&key) {
            merged[pos] = sub;
        } else {
            positions.insert(key, merged.len());
            merged.push(sub);
        }
    }

    merged
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// What the session must do after a subscription request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// Not authenticated yet; the batch waits for the next authentication.
    Queued {
        /// Number of batches now waiting.
        pending_batches: usize,
    },
    /// Send this full active set as one subscribe frame.
    Send(Vec<Subscription>),
}

/// Authoritative subscription state of one session.
///
/// Owned by the session task; not shared, not locked.
///
/// # Example
///
/// ```rust
/// use okotoki_stream_client::domain::market::Exchange;
/// use okotoki_stream_client::domain::subscription::{
///     RequestOutcome, SubscriptionRegistry, index, price,
/// };
///
/// let mut registry = SubscriptionRegistry::new();
///
/// // Before authentication requests are queued
/// let outcome = registry.request(vec![index("BTC")]);
/// assert_eq!(outcome, RequestOutcome::Queued { pending_batches: 1 });
///
/// // Authentication flushes the queue into the active set
/// let initial = registry.mark_authenticated();
/// assert_eq!(initial, vec![index("BTC")]);
///
/// // Afterwards every request yields the full set
/// let outcome = registry.request(vec![price(Exchange::Binance, "BTCUSDT")]);
/// assert_eq!(
///     outcome,
///     RequestOutcome::Send(vec![index("BTC"), price(Exchange::Binance, "BTCUSDT")])
/// );
/// ```
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    active: Vec<Subscription>,
    pending: Vec<Vec<Subscription>>,
    authenticated: bool,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a batch of subscriptions.
    pub fn request(&mut self, batch: Vec<Subscription>) -> RequestOutcome {
        if !self.authenticated {
            self.pending.push(batch);
            return RequestOutcome::Queued {
                pending_batches: self.pending.len(),
            };
        }

        self.active = merge_subscriptions(&self.active, batch);
        RequestOutcome::Send(self.active.clone())
    }

    /// Record a successful authentication.
    ///
    /// Queued batches are merged together in request order (later batches
    /// win), folded into the active set, and the full set is returned.
    pub fn mark_authenticated(&mut self) -> Vec<Subscription> {
        self.authenticated = true;

        let queued = self
            .pending
            .drain(..)
            .fold(Vec::new(), |acc, batch| merge_subscriptions(&acc, batch));

        self.active = merge_subscriptions(&self.active, queued);
        self.active.clone()
    }

    /// Record that the connection carrying the authentication is gone.
    pub const fn mark_unauthenticated(&mut self) {
        self.authenticated = false;
    }

    /// Check whether requests are currently sent immediately.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Get the active set.
    #[must_use]
    pub fn active(&self) -> &[Subscription] {
        &self.active
    }

    /// Get the number of batches waiting for authentication.
    #[must_use]
    pub fn pending_batches(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use proptest::prelude::*;

    fn trades(threshold: f64) -> Subscription {
        large_trades(
            Exchange::Binance,
            "BTCUSDT",
            TradeSubscriptionOptions {
                threshold_trades: threshold,
                limit_trades: 30,
                threshold_liquidations: None,
                limit_liquidations: None,
            },
        )
    }

    #[test]
    fn identity_ignores_options() {
        assert_eq!(trades(10_000.0).identity(), trades(50_000.0).identity());
    }

    #[test]
    fn identity_distinguishes_kind() {
        let price = price(Exchange::Binance, "BTCUSDT");
        let volume = trade_volume(Exchange::Binance, "BTCUSDT");
        assert_ne!(price.identity(), volume.identity());
    }

    #[test]
    fn identity_distinguishes_exchange() {
        let spot = price(Exchange::Binance, "BTCUSDT");
        let futures = price(Exchange::BinanceF, "BTCUSDT");
        assert_ne!(spot.identity(), futures.identity());
    }

    #[test]
    fn index_identity_is_coin() {
        assert_eq!(
            index("BTC").identity(),
            IdentityKey::Coin {
                kind: SubscriptionKind::Index,
                coin: "BTC".to_string()
            }
        );
    }

    #[test]
    fn merge_same_identity_replaces() {
        let merged = merge_subscriptions(&[trades(10_000.0)], vec![trades(50_000.0)]);
        assert_eq!(merged, vec![trades(50_000.0)]);
    }

    #[test]
    fn merge_retains_unrelated_entries() {
        let merged = merge_subscriptions(&[index("BTC")], vec![index("ETH")]);
        assert_eq!(merged, vec![index("BTC"), index("ETH")]);
    }

    #[test]
    fn merge_dedups_within_batch() {
        let merged = merge_subscriptions(&[], vec![trades(1.0), trades(2.0), trades(3.0)]);
        assert_eq!(merged, vec![trades(3.0)]);
    }

    #[test]
    fn registry_queues_before_auth() {
        let mut registry = SubscriptionRegistry::new();

        assert_eq!(
            registry.request(vec![index("BTC")]),
            RequestOutcome::Queued { pending_batches: 1 }
        );
        assert_eq!(
            registry.request(vec![index("ETH")]),
            RequestOutcome::Queued { pending_batches: 2 }
        );
        assert!(registry.active().is_empty());
    }

    #[test]
    fn registry_flush_later_batch_wins() {
        let mut registry = SubscriptionRegistry::new();
        registry.request(vec![trades(10_000.0), index("BTC")]);
        registry.request(vec![trades(50_000.0)]);

        let initial = registry.mark_authenticated();

        assert_eq!(initial, vec![trades(50_000.0), index("BTC")]);
        assert_eq!(registry.pending_batches(), 0);
    }

    #[test]
    fn registry_sends_full_set_when_authenticated() {
        let mut registry = SubscriptionRegistry::new();
        registry.request(vec![index("BTC")]);
        registry.mark_authenticated();

        let outcome = registry.request(vec![index("ETH")]);

        assert_eq!(
            outcome,
            RequestOutcome::Send(vec![index("BTC"), index("ETH")])
        );
    }

    #[test]
    fn registry_keeps_active_set_across_reauth() {
        let mut registry = SubscriptionRegistry::new();
        registry.request(vec![index("BTC")]);
        registry.mark_authenticated();

        registry.mark_unauthenticated();
        assert!(!registry.is_authenticated());
        registry.request(vec![index("ETH")]);

        let replay = registry.mark_authenticated();
        assert_eq!(replay, vec![index("BTC"), index("ETH")]);
    }

    #[test]
    fn subscription_wire_format() {
        let json = serde_json::to_value(trades(50_000.0)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "largeTrades",
                "exchange": "binance",
                "symbol": "BTCUSDT",
                "thresholdTrades": 50_000.0,
                "limitTrades": 30
            })
        );
    }

    #[test]
    fn subscription_parses_candles() {
        let json = r#"{"kind":"candles","exchange":"binance","symbol":"BTCUSDT",
            "interval":60000,"window":3600000,"metrics":["open","low","high"]}"#;

        let sub: Subscription = serde_json::from_str(json).unwrap();
        assert_eq!(sub.kind(), SubscriptionKind::Candles);
        assert_eq!(sub.market(), Some((Exchange::Binance, "BTCUSDT")));
    }

    fn arb_subscription() -> impl Strategy<Value = Subscription> {
        let coin = prop::sample::select(vec!["BTC", "ETH", "SOL"]);
        let symbol = prop::sample::select(vec!["BTCUSDT", "ETHUSDT"]);
        let exchange = prop::sample::select(vec![Exchange::Binance, Exchange::Bitmex]);
        prop_oneof![
            coin.prop_map(|c| index(c)),
            (exchange.clone(), symbol.clone()).prop_map(|(e, s)| price(e, s)),
            (exchange, symbol, 1.0..100_000.0f64).prop_map(|(e, s, t)| large_trades(
                e,
                s,
                TradeSubscriptionOptions {
                    threshold_trades: t,
                    limit_trades: 10,
                    threshold_liquidations: None,
                    limit_liquidations: None,
                }
            )),
        ]
    }

    proptest! {
        #[test]
        fn merge_keeps_identities_unique(
            current in prop::collection::vec(arb_subscription(), 0..8),
            incoming in prop::collection::vec(arb_subscription(), 0..8),
        ) {
            let base = merge_subscriptions(&[], current);
            let merged = merge_subscriptions(&base, incoming.clone());

            let keys: HashSet<_> = merged.iter().map(Subscription::identity).collect();
            prop_assert_eq!(keys.len(), merged.len());

            // The last incoming entry of each identity is what survives
            for sub in &incoming {
                let last = incoming.iter().rev().find(|s| s.identity() == sub.identity());
                prop_assert!(merged.iter().any(|m| Some(m) == last));
            }
        }
    }
}
