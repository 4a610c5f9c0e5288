//! Subscription constructors.
//!
//! Plain mappings from a market (or coin) and options to a [`Subscription`].

use super::{
    CandlesSubscriptionOptions, LeveledTradeVolumeSubscriptionOptions,
    OrderBookSubscriptionOptions, Subscription, TradeSubscriptionOptions,
};
use crate::domain::market::Exchange;

/// Index price of a coin.
#[must_use]
pub fn index(coin: impl Into<String>) -> Subscription {
    Subscription::Index { coin: coin.into() }
}

/// Last price of a market.
#[must_use]
pub fn price(exchange: Exchange, symbol: impl Into<String>) -> Subscription {
    Subscription::Price {
        exchange,
        symbol: symbol.into(),
    }
}

/// Rolling trade volume of a market.
#[must_use]
pub fn trade_volume(exchange: Exchange, symbol: impl Into<String>) -> Subscription {
    Subscription::TradeVolume {
        exchange,
        symbol: symbol.into(),
    }
}

/// Large trades and liquidations of a market.
#[must_use]
pub fn large_trades(
    exchange: Exchange,
    symbol: impl Into<String>,
    options: TradeSubscriptionOptions,
) -> Subscription {
    Subscription::LargeTrades {
        exchange,
        symbol: symbol.into(),
        options,
    }
}

/// Aggregated order book of a market.
#[must_use]
pub fn order_book(
    exchange: Exchange,
    symbol: impl Into<String>,
    options: OrderBookSubscriptionOptions,
) -> Subscription {
    Subscription::OrderBook {
        exchange,
        symbol: symbol.into(),
        options,
    }
}

/// Price-leveled trade volume of a market.
#[must_use]
pub fn leveled_trade_volume(
    exchange: Exchange,
    symbol: impl Into<String>,
    options: LeveledTradeVolumeSubscriptionOptions,
) -> Subscription {
    Subscription::LeveledTradeVolume {
        exchange,
        symbol: symbol.into(),
        options,
    }
}

/// Candles of a market.
#[must_use]
pub fn candles(
    exchange: Exchange,
    symbol: impl Into<String>,
    options: CandlesSubscriptionOptions,
) -> Subscription {
    Subscription::Candles {
        exchange,
        symbol: symbol.into(),
        options,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::SubscriptionKind;

    #[test]
    fn builders_set_kind() {
        let book = order_book(
            Exchange::Binance,
            "BTCUSDT",
            OrderBookSubscriptionOptions {
                step: 10.0,
                rate: 1000,
                interval: 60_000,
                window: 0,
            },
        );
        assert_eq!(book.kind(), SubscriptionKind::OrderBook);

        let volume = leveled_trade_volume(
            Exchange::Binance,
            "BTCUSDT",
            LeveledTradeVolumeSubscriptionOptions {
                interval: 60_000,
                window: 3_600_000,
                step: 10.0,
            },
        );
        assert_eq!(volume.kind(), SubscriptionKind::LeveledTradeVolume);
        assert_eq!(index("ETH").kind(), SubscriptionKind::Index);
    }

    #[test]
    fn order_book_wire_format() {
        let book = order_book(
            Exchange::Bitmex,
            "XBTUSD",
            OrderBookSubscriptionOptions {
                step: 0.5,
                rate: 1000,
                interval: 60_000,
                window: 0,
            },
        );

        assert_eq!(
            serde_json::to_value(book).unwrap(),
            serde_json::json!({
                "kind": "orderBook",
                "exchange": "bitmex",
                "symbol": "XBTUSD",
                "step": 0.5,
                "rate": 1000,
                "interval": 60000,
                "window": 0
            })
        );
    }
}
