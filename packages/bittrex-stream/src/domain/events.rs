//! Feed Event Types
//!
//! Typed deltas decoded from the push hub. Field names follow the exchange's
//! camelCase JSON schema; decimal fields arrive as strings and are parsed into
//! [`Decimal`] without going through floating point.
//!
//! Account feeds (order, balance) carry an `account_id` and a per-account
//! `sequence`. Gap detection on that sequence is left to the consumer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::feed::FeedKind;

/// An event type that one feed decodes its payloads into.
///
/// The associated [`FeedKind`] ties each event type to its routing table, so
/// a feed can only ever be wired to the decoder for its own event type.
pub trait FeedEvent: DeserializeOwned + Send + 'static {
    /// Feed this event belongs to.
    const FEED: FeedKind;
}

// =============================================================================
// Ticker
// =============================================================================

/// Best bid/ask and last trade for one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerEvent {
    /// Market symbol, e.g. `BTC-USDT`.
    #[serde(default)]
    pub symbol: String,
    /// Rate of the last trade.
    pub last_trade_rate: Decimal,
    /// Best bid.
    pub bid_rate: Decimal,
    /// Best ask.
    pub ask_rate: Decimal,
}

impl FeedEvent for TickerEvent {
    const FEED: FeedKind = FeedKind::Ticker;
}

// =============================================================================
// Order Book
// =============================================================================

/// One price level change. A zero quantity removes the level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookEntry {
    /// Quantity resting at `rate` after the update.
    pub quantity: Decimal,
    /// Price level.
    pub rate: Decimal,
}

/// Incremental order book update for a fixed-depth book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookEvent {
    /// Market symbol.
    pub market_symbol: String,
    /// Depth of the subscribed book.
    pub depth: u32,
    /// Book sequence number.
    pub sequence: u64,
    /// Bid side changes.
    #[serde(default)]
    pub bid_deltas: Vec<OrderBookEntry>,
    /// Ask side changes.
    #[serde(default)]
    pub ask_deltas: Vec<OrderBookEntry>,
}

impl FeedEvent for OrderBookEvent {
    const FEED: FeedKind = FeedKind::OrderBook;
}

// =============================================================================
// Orders
// =============================================================================

/// State of an order after the change that triggered the update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDelta {
    /// Exchange order id.
    pub id: String,
    /// Market symbol.
    pub market_symbol: String,
    /// `BUY` or `SELL`.
    pub direction: String,
    /// `LIMIT`, `MARKET`, `CEILING_LIMIT`, ...
    #[serde(rename = "type")]
    pub order_type: String,
    /// Ordered quantity.
    #[serde(default)]
    pub quantity: Option<Decimal>,
    /// Limit price, absent for market orders.
    #[serde(default)]
    pub limit: Option<Decimal>,
    /// Ceiling, only for ceiling orders.
    #[serde(default)]
    pub ceiling: Option<Decimal>,
    /// Time in force.
    pub time_in_force: String,
    /// Client supplied id.
    #[serde(default)]
    pub client_order_id: Option<String>,
    /// Quantity filled so far.
    pub fill_quantity: Decimal,
    /// Commission paid so far.
    pub commission: Decimal,
    /// Proceeds so far.
    pub proceeds: Decimal,
    /// `OPEN` or `CLOSED`.
    pub status: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Close time, set once the order is closed.
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Order change on the authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    /// Account the order belongs to.
    pub account_id: String,
    /// Per-account order feed sequence.
    pub sequence: u64,
    /// New order state.
    pub delta: OrderDelta,
}

impl FeedEvent for OrderEvent {
    const FEED: FeedKind = FeedKind::Order;
}

// =============================================================================
// Balances
// =============================================================================

/// Balance of one currency after a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDelta {
    /// Currency symbol, e.g. `BTC`.
    pub currency_symbol: String,
    /// Total balance.
    pub total: Decimal,
    /// Balance available for trading.
    pub available: Decimal,
    /// Time of the change.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Balance change on the authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEvent {
    /// Account the balance belongs to.
    pub account_id: String,
    /// Per-account balance feed sequence.
    pub sequence: u64,
    /// New balance.
    pub delta: BalanceDelta,
}

impl FeedEvent for BalanceEvent {
    const FEED: FeedKind = FeedKind::Balance;
}
