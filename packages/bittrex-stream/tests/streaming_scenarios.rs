//! End-to-end feed behavior against an in-memory hub.

mod common;

use std::convert::Infallible;
use std::time::Duration;

use bittrex_stream::{
    AuthError, ConfigError, Credentials, FeedKind, ReconnectConfig, StreamError, StreamSettings,
    Supervisor, TickerEvent,
};
use common::{FakeHub, HUB};
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type FeedHandle = JoinHandle<Result<Infallible, StreamError>>;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn credentials() -> Credentials {
    Credentials::new("key", "secret").unwrap()
}

fn spawn_ticker(hub: &FakeHub, capacity: usize) -> (FeedHandle, mpsc::Receiver<TickerEvent>) {
    let client = hub.client(StreamSettings::default());
    let (tx, rx) = mpsc::channel(capacity);
    let handle = tokio::spawn(async move { client.subscribe_ticker_updates("BTC-USDT", tx).await });
    (handle, rx)
}

async fn ended(handle: FeedHandle) -> StreamError {
    match tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("feed did not end")
        .expect("feed task panicked")
    {
        Ok(never) => match never {},
        Err(e) => e,
    }
}

// =============================================================================
// Ticker
// =============================================================================

#[tokio::test]
async fn ticker_push_is_decoded_and_delivered() {
    let hub = FakeHub::new();
    let (feed, mut rx) = spawn_ticker(&hub, 8);
    hub.until_subscribed().await;

    hub.push(HUB, "heartbeat", vec![]);
    hub.push_json(
        "ticker",
        &[json!({"lastTradeRate": "100.5", "bidRate": "100.4", "askRate": "100.6"})],
    );

    let event = rx.recv().await.unwrap();
    assert_eq!(event.last_trade_rate, dec("100.5"));
    assert_eq!(event.bid_rate, dec("100.4"));
    assert_eq!(event.ask_rate, dec("100.6"));
    assert!(rx.try_recv().is_err());

    hub.disconnect();
    ended(feed).await;
}

#[tokio::test]
async fn ticker_subscribes_heartbeat_ticker_and_trade() {
    let hub = FakeHub::new();
    let (feed, _rx) = spawn_ticker(&hub, 8);
    hub.until_subscribed().await;

    let subscribe = hub.invocations("Subscribe");
    assert_eq!(subscribe.len(), 1);
    assert_eq!(subscribe[0].hub, HUB);
    assert_eq!(
        subscribe[0].args,
        vec![json!(["heartbeat", "ticker_BTC-USDT", "trade_BTC-USDT"])]
    );
    assert!(hub.invocations("Authenticate").is_empty());

    hub.disconnect();
    ended(feed).await;
}

#[tokio::test]
async fn undecodable_payload_does_not_end_feed() {
    let hub = FakeHub::new();
    let (feed, mut rx) = spawn_ticker(&hub, 8);
    hub.until_subscribed().await;

    hub.push(HUB, "ticker", vec!["\"AAAA\"".to_string()]);
    hub.push_json("ticker", &[json!({"unexpected": true})]);
    hub.push_json(
        "ticker",
        &[json!({"symbol": "BTC-USDT", "lastTradeRate": "1", "bidRate": "1", "askRate": "1"})],
    );

    assert_eq!(rx.recv().await.unwrap().symbol, "BTC-USDT");
    assert!(!feed.is_finished());

    hub.disconnect();
    ended(feed).await;
}

#[tokio::test]
async fn full_channel_drops_newest_events() {
    let hub = FakeHub::new();
    let (feed, mut rx) = spawn_ticker(&hub, 2);
    hub.until_subscribed().await;

    let documents: Vec<_> = (1..=5)
        .map(|i| json!({"lastTradeRate": i.to_string(), "bidRate": "0", "askRate": "0"}))
        .collect();
    hub.push_json("ticker", &documents);

    assert_eq!(rx.recv().await.unwrap().last_trade_rate, dec("1"));
    assert_eq!(rx.recv().await.unwrap().last_trade_rate, dec("2"));
    assert!(rx.try_recv().is_err());

    hub.disconnect();
    ended(feed).await;
}

// =============================================================================
// Termination
// =============================================================================

#[tokio::test]
async fn disconnect_ends_feed_and_closes_once() {
    let hub = FakeHub::new();
    let (feed, _rx) = spawn_ticker(&hub, 8);
    hub.until_subscribed().await;

    hub.disconnect();

    assert!(matches!(ended(feed).await, StreamError::Disconnected));
    assert_eq!(hub.closes(), 1);
}

#[tokio::test]
async fn stop_signal_ends_orderbook_feed() {
    let hub = FakeHub::new();
    let client = hub.client(StreamSettings::default());
    let (tx, _rx) = mpsc::channel(8);
    let stop = CancellationToken::new();

    let feed = {
        let stop = stop.clone();
        tokio::spawn(async move { client.subscribe_orderbook_updates("ETH-BTC", tx, stop).await })
    };
    hub.until_subscribed().await;
    assert_eq!(
        hub.invocations("Subscribe")[0].args,
        vec![json!(["heartbeat", "orderbook_ETH-BTC_25"])]
    );

    stop.cancel();

    assert!(matches!(ended(feed).await, StreamError::Stopped));
    assert_eq!(hub.closes(), 1);
}

#[tokio::test]
async fn orderbook_deltas_are_delivered() {
    let hub = FakeHub::new();
    let client = hub.client(StreamSettings::default());
    let (tx, mut rx) = mpsc::channel(8);
    let stop = CancellationToken::new();

    let feed = {
        let stop = stop.clone();
        tokio::spawn(async move { client.subscribe_orderbook_updates("ETH-BTC", tx, stop).await })
    };
    hub.until_subscribed().await;

    hub.push_json(
        "orderBook",
        &[json!({
            "marketSymbol": "ETH-BTC",
            "depth": 25,
            "sequence": 7,
            "bidDeltas": [{"quantity": "1.5", "rate": "0.05"}],
            "askDeltas": []
        })],
    );

    let book = rx.recv().await.unwrap();
    assert_eq!(book.market_symbol, "ETH-BTC");
    assert_eq!(book.sequence, 7);
    assert_eq!(book.bid_deltas[0].quantity, dec("1.5"));
    assert!(book.ask_deltas.is_empty());

    stop.cancel();
    ended(feed).await;
}

#[tokio::test]
async fn dropped_receiver_ends_feed() {
    let hub = FakeHub::new();
    let (feed, rx) = spawn_ticker(&hub, 8);
    hub.until_subscribed().await;

    drop(rx);

    assert!(matches!(ended(feed).await, StreamError::ConsumerClosed));
    assert_eq!(hub.closes(), 1);
}

#[tokio::test]
async fn refused_subscription_ends_feed() {
    let hub = FakeHub::new();
    hub.respond(
        "Subscribe",
        json!([
            {"Success": true, "ErrorCode": null},
            {"Success": false, "ErrorCode": "INVALID_MARKET"},
            {"Success": true, "ErrorCode": null}
        ]),
    );
    let (feed, _rx) = spawn_ticker(&hub, 8);

    let error = ended(feed).await;
    assert!(matches!(error, StreamError::Subscribe(ref m) if m.contains("INVALID_MARKET")));
    assert_eq!(hub.closes(), 1);
}

#[tokio::test]
async fn aborted_feed_releases_connection() {
    let hub = FakeHub::new();
    let (feed, _rx) = spawn_ticker(&hub, 8);
    hub.until_subscribed().await;

    feed.abort();
    assert!(feed.await.unwrap_err().is_cancelled());

    hub.until_closed(1).await;
    assert_eq!(hub.connects(), 1);
    assert_eq!(hub.closes(), 1);
}

#[tokio::test]
async fn stop_interrupts_unanswered_subscribe() {
    let hub = FakeHub::new();
    hub.stall("Subscribe");
    let client = hub.client(StreamSettings::default());
    let (tx, _rx) = mpsc::channel(8);
    let stop = CancellationToken::new();

    let feed = {
        let stop = stop.clone();
        tokio::spawn(async move { client.subscribe_orderbook_updates("ETH-BTC", tx, stop).await })
    };
    hub.until_subscribed().await;

    stop.cancel();

    assert!(matches!(ended(feed).await, StreamError::Stopped));
    assert_eq!(hub.closes(), 1);
}

#[tokio::test]
async fn disconnect_interrupts_unanswered_authenticate() {
    let hub = FakeHub::new();
    hub.stall("Authenticate");
    let client = hub.client(StreamSettings::default()).with_credentials(credentials());
    let (tx, _rx) = mpsc::channel(8);
    let feed = tokio::spawn(async move { client.subscribe_order_updates(tx).await });
    hub.until_invoked("Authenticate", 1).await;

    hub.disconnect();

    assert!(matches!(ended(feed).await, StreamError::Disconnected));
    assert!(hub.invocations("Subscribe").is_empty());
    assert_eq!(hub.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_interrupts_unanswered_refresh() {
    let hub = FakeHub::new();
    let client = hub.client(StreamSettings::default()).with_credentials(credentials());
    let (tx, _rx) = mpsc::channel(8);
    let feed = tokio::spawn(async move { client.subscribe_balance_updates(tx).await });
    hub.until_subscribed().await;

    hub.stall("Authenticate");
    tokio::time::sleep(Duration::from_secs(301)).await;
    hub.until_invoked("Authenticate", 2).await;

    hub.disconnect();

    assert!(matches!(ended(feed).await, StreamError::Disconnected));
    assert_eq!(hub.closes(), 1);
}

#[tokio::test]
async fn empty_hub_name_is_rejected_before_connecting() {
    let hub = FakeHub::new();
    let client = hub.client(StreamSettings {
        hub: String::new(),
        ..StreamSettings::default()
    });
    let (tx, _rx) = mpsc::channel(8);

    let Err(error) = client.subscribe_ticker_updates("BTC-USDT", tx).await;

    assert!(matches!(error, StreamError::Config(ConfigError::EmptyValue(ref v)) if v == "hub"));
    assert_eq!(hub.connects(), 0);
}

// =============================================================================
// Liveness
// =============================================================================

#[tokio::test(start_paused = true)]
async fn silent_feed_times_out_within_one_check() {
    let hub = FakeHub::new();
    let (feed, _rx) = spawn_ticker(&hub, 8);
    hub.until_subscribed().await;
    let start = tokio::time::Instant::now();

    let error = match feed.await.unwrap() {
        Ok(never) => match never {},
        Err(e) => e,
    };

    match error {
        StreamError::FeedTimeout { feed, idle } => {
            assert_eq!(feed, FeedKind::Ticker);
            assert!(idle > Duration::from_secs(60));
        }
        other => panic!("expected feed timeout, got {other:?}"),
    }
    assert!(start.elapsed() <= Duration::from_secs(120));
    assert_eq!(hub.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn heartbeats_keep_feed_alive() {
    let hub = FakeHub::new();
    let (feed, _rx) = spawn_ticker(&hub, 8);
    hub.until_subscribed().await;

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(30)).await;
        hub.push(HUB, "heartbeat", vec![]);
    }
    assert!(!feed.is_finished());

    hub.disconnect();
    assert!(matches!(ended(feed).await, StreamError::Disconnected));
}

#[tokio::test(start_paused = true)]
async fn trades_count_as_activity() {
    let hub = FakeHub::new();
    let (feed, mut rx) = spawn_ticker(&hub, 8);
    hub.until_subscribed().await;

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_secs(45)).await;
        hub.push_json("trade", &[json!({"id": "t1"})]);
    }
    assert!(!feed.is_finished());
    assert!(rx.try_recv().is_err());

    hub.disconnect();
    ended(feed).await;
}

// =============================================================================
// Account Feeds
// =============================================================================

#[tokio::test]
async fn account_feeds_need_credentials() {
    let hub = FakeHub::new();
    let client = hub.client(StreamSettings::default());
    let (tx, _rx) = mpsc::channel(8);

    let Err(error) = client.subscribe_order_updates(tx).await;

    assert!(matches!(
        error,
        StreamError::Config(ConfigError::MissingCredentials("order"))
    ));
    assert_eq!(hub.connects(), 0);
}

#[tokio::test]
async fn order_feed_authenticates_before_subscribing() {
    let hub = FakeHub::new();
    let client = hub.client(StreamSettings::default()).with_credentials(credentials());
    let (tx, mut rx) = mpsc::channel(8);
    let feed = tokio::spawn(async move { client.subscribe_order_updates(tx).await });
    hub.until_subscribed().await;

    assert_eq!(hub.methods(), vec!["Authenticate", "Subscribe"]);
    let auth = &hub.invocations("Authenticate")[0];
    assert_eq!(auth.args.len(), 4);
    assert_eq!(auth.args[0], json!("key"));
    assert!(auth.args[1].is_i64());
    assert_eq!(
        hub.invocations("Subscribe")[0].args,
        vec![json!(["heartbeat", "order"])]
    );

    hub.push_json(
        "order",
        &[json!({
            "accountId": "acc-1",
            "sequence": 3,
            "delta": {
                "id": "o-1",
                "marketSymbol": "BTC-USDT",
                "direction": "BUY",
                "type": "LIMIT",
                "quantity": "0.1",
                "limit": "50000",
                "timeInForce": "GOOD_TIL_CANCELLED",
                "fillQuantity": "0",
                "commission": "0",
                "proceeds": "0",
                "status": "OPEN",
                "createdAt": "2024-01-01T00:00:00Z"
            }
        })],
    );
    let order = rx.recv().await.unwrap();
    assert_eq!(order.sequence, 3);
    assert_eq!(order.delta.id, "o-1");

    hub.disconnect();
    ended(feed).await;
}

#[tokio::test(start_paused = true)]
async fn order_feed_reauthenticates_every_interval() {
    let hub = FakeHub::new();
    let client = hub.client(StreamSettings::default()).with_credentials(credentials());
    let (tx, _rx) = mpsc::channel(8);
    let feed = tokio::spawn(async move { client.subscribe_order_updates(tx).await });
    hub.until_subscribed().await;

    tokio::time::sleep(Duration::from_secs(2 * 300 + 50)).await;

    assert_eq!(hub.invocations("Authenticate").len(), 3);
    assert!(!feed.is_finished());

    hub.disconnect();
    assert!(matches!(ended(feed).await, StreamError::Disconnected));
}

#[tokio::test]
async fn authentication_expiring_triggers_refresh() {
    let hub = FakeHub::new();
    let client = hub.client(StreamSettings::default()).with_credentials(credentials());
    let (tx, _rx) = mpsc::channel(8);
    let feed = tokio::spawn(async move { client.subscribe_order_updates(tx).await });
    hub.until_subscribed().await;

    hub.push(HUB, "authenticationExpiring", vec![]);
    hub.until_invoked("Authenticate", 2).await;

    hub.disconnect();
    ended(feed).await;
}

#[tokio::test]
async fn balance_feed_subscribes_balance_only() {
    let hub = FakeHub::new();
    let client = hub.client(StreamSettings::default()).with_credentials(credentials());
    let (tx, mut rx) = mpsc::channel(8);
    let feed = tokio::spawn(async move { client.subscribe_balance_updates(tx).await });
    hub.until_subscribed().await;

    assert_eq!(hub.invocations("Subscribe")[0].args, vec![json!(["balance"])]);

    hub.push_json(
        "balance",
        &[json!({
            "accountId": "acc-1",
            "sequence": 9,
            "delta": {"currencySymbol": "BTC", "total": "1.25", "available": "1.0"}
        })],
    );
    let balance = rx.recv().await.unwrap();
    assert_eq!(balance.delta.currency_symbol, "BTC");
    assert_eq!(balance.delta.total, dec("1.25"));

    hub.disconnect();
    ended(feed).await;
}

#[tokio::test]
async fn rejected_authentication_ends_feed() {
    let hub = FakeHub::new();
    hub.respond(
        "Authenticate",
        json!({"Success": false, "ErrorCode": "INVALID_SIGNATURE"}),
    );
    let client = hub.client(StreamSettings::default()).with_credentials(credentials());
    let (tx, _rx) = mpsc::channel(8);

    let Err(error) = client.subscribe_balance_updates(tx).await;

    assert!(matches!(
        error,
        StreamError::Auth(AuthError::Rejected { code: Some(ref c) }) if c == "INVALID_SIGNATURE"
    ));
    assert!(hub.invocations("Subscribe").is_empty());
    assert_eq!(hub.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_ends_feed() {
    let hub = FakeHub::new();
    let client = hub.client(StreamSettings::default()).with_credentials(credentials());
    let (tx, _rx) = mpsc::channel(8);
    let feed = tokio::spawn(async move { client.subscribe_order_updates(tx).await });
    hub.until_subscribed().await;

    hub.respond("Authenticate", json!({"Success": false, "ErrorCode": "EXPIRED"}));
    let error = match feed.await.unwrap() {
        Ok(never) => match never {},
        Err(e) => e,
    };

    assert!(matches!(error, StreamError::Auth(_)));
    assert_eq!(hub.invocations("Authenticate").len(), 2);
    assert_eq!(hub.closes(), 1);
}

// =============================================================================
// Connect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn slow_connect_times_out_and_late_connection_is_closed() {
    let hub = FakeHub::new().with_connect_delay(Duration::from_secs(30));
    let client = hub.client(StreamSettings::default());
    let (tx, _rx) = mpsc::channel(8);

    let Err(error) = client.subscribe_ticker_updates("BTC-USDT", tx).await;
    assert!(matches!(error, StreamError::ConnectTimeout(d) if d == Duration::from_secs(5)));
    assert!(hub.connect_cancelled());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(hub.closes(), 1);
    assert!(hub.invocations("Subscribe").is_empty());
}

#[tokio::test(start_paused = true)]
async fn account_feeds_allow_longer_connects() {
    let hub = FakeHub::new().with_connect_delay(Duration::from_secs(10));
    let client = hub.client(StreamSettings::default()).with_credentials(credentials());
    let (tx, _rx) = mpsc::channel(8);
    let feed = tokio::spawn(async move { client.subscribe_balance_updates(tx).await });

    tokio::time::sleep(Duration::from_secs(11)).await;
    hub.until_subscribed().await;
    hub.disconnect();
    assert!(matches!(ended(feed).await, StreamError::Disconnected));
}

// =============================================================================
// Supervision
// =============================================================================

#[tokio::test(start_paused = true)]
async fn supervisor_restarts_after_disconnect() {
    let hub = FakeHub::new();
    let client = hub.client(StreamSettings::default());
    let (tx, rx) = mpsc::channel::<TickerEvent>(8);

    let supervisor = Supervisor::new(
        FeedKind::Ticker,
        ReconnectConfig::new(Duration::from_secs(1), Duration::from_secs(8), 2.0, 0.0, 0),
        CancellationToken::new(),
    );
    let run = tokio::spawn(supervisor.run(move || {
        let client = client.clone();
        let tx = tx.clone();
        async move { client.subscribe_ticker_updates("BTC-USDT", tx).await }
    }));

    hub.until_invoked("Subscribe", 1).await;
    hub.disconnect();
    tokio::time::sleep(Duration::from_secs(2)).await;
    hub.until_invoked("Subscribe", 2).await;
    assert_eq!(hub.connects(), 2);
    assert_eq!(hub.closes(), 1);

    drop(rx);
    let error = run.await.unwrap();
    assert!(matches!(error, StreamError::ConsumerClosed));
    assert_eq!(hub.closes(), 2);
}
