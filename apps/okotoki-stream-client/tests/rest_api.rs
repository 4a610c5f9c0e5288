//! REST Lookup Integration Tests
//!
//! Coin and market lookups against a mock HTTP server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use okotoki_stream_client::{Exchange, MarketState, RestClient, RestError};

fn client_for(server: &MockServer) -> RestClient {
    RestClient::new(format!("{}/", server.uri())).unwrap()
}

#[tokio::test]
async fn test_supported_coins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["BTC", "ETH", "SOL"])))
        .expect(1)
        .mount(&server)
        .await;

    let coins = client_for(&server).supported_coins().await.unwrap();
    assert_eq!(coins, vec!["BTC", "ETH", "SOL"]);
}

#[tokio::test]
async fn test_markets_for_coin_uppercases_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/BTC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "exchange": "binance-Ⓕ",
                "symbol": "BTCUSDT",
                "marketType": "perpetual",
                "base": "BTC",
                "baseNormalized": "BTC",
                "quote": "USDT",
                "quoteNormalized": "USDT",
                "state": "enabled",
                "updatedTimestamp": "2024-05-01T12:00:00Z",
                "isFree": true,
                "stateHistory": [
                    {"state": "disabled", "timestamp": "2024-04-30T08:00:00Z"},
                    {"state": "enabled", "timestamp": "2024-05-01T12:00:00Z"}
                ]
            },
            {
                "exchange": "bitmex",
                "symbol": "XBTUSD",
                "marketType": "perpetual",
                "base": "XBT",
                "baseNormalized": "BTC",
                "quote": "USD",
                "quoteNormalized": "USD",
                "state": "unlisted",
                "updatedTimestamp": "2024-05-01T12:00:00Z",
                "isFree": false
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let markets = client_for(&server)
        .markets_for_coin("btc")
        .await
        .unwrap();

    assert_eq!(markets.len(), 2);
    assert_eq!(markets[0].exchange, Exchange::BinanceF);
    assert!(markets[0].is_enabled());
    assert_eq!(
        markets[0].last_transition().map(|event| event.state),
        Some(MarketState::Enabled)
    );
    assert_eq!(markets[1].base_normalized, "BTC");
    assert!(!markets[1].is_enabled());
    assert!(markets[1].state_history.is_empty());
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/DOGE"))
        .respond_with(ResponseTemplate::new(404).set_body_string("unknown coin"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .markets_for_coin("doge")
        .await
        .unwrap_err();

    match err {
        RestError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "unknown coin");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"coins\":"))
        .mount(&server)
        .await;

    let err = client_for(&server).supported_coins().await.unwrap_err();
    assert!(matches!(err, RestError::Decode(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let client = RestClient::new("http://127.0.0.1:9").unwrap();
    let err = client.supported_coins().await.unwrap_err();
    assert!(matches!(err, RestError::Network(_)));
}
