//! Feed Routing Types
//!
//! Closed vocabulary for the push hub: which feeds exist, which server-pushed
//! method names the hub can send, and what each feed does with each method.
//!
//! # Routing Table
//!
//! | feed       | heartbeat | ticker  | trade    | orderBook | order   | balance | authenticationExpiring |
//! |------------|-----------|---------|----------|-----------|---------|---------|------------------------|
//! | ticker     | liveness  | deliver | liveness | -         | -       | -       | -                      |
//! | order book | liveness  | -       | -        | deliver   | -       | -       | -                      |
//! | order      | liveness  | -       | -        | -         | deliver | -       | refresh auth           |
//! | balance    | -         | -       | -        | -         | -       | deliver | -                      |
//!
//! `-` routes are ignored (logged by the dispatcher). Method names the hub
//! sends that are not listed fail [`HubMethod::from_wire`] and are ignored too.

use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// Feed Kind
// =============================================================================

/// Logical subscription category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// Best bid/ask and last trade for one market.
    Ticker,
    /// Fixed-depth order book deltas for one market.
    OrderBook,
    /// Order changes on the authenticated account.
    Order,
    /// Balance changes on the authenticated account.
    Balance,
}

impl FeedKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::OrderBook => "orderbook",
            Self::Order => "order",
            Self::Balance => "balance",
        }
    }

    /// Whether the feed needs an authenticated (account-scoped) session.
    #[must_use]
    pub const fn requires_auth(self) -> bool {
        matches!(self, Self::Order | Self::Balance)
    }

    /// Decide what the dispatcher does with `method` on this feed.
    #[must_use]
    pub const fn route(self, method: HubMethod) -> Route {
        match (self, method) {
            (Self::Ticker, HubMethod::Ticker)
            | (Self::OrderBook, HubMethod::OrderBook)
            | (Self::Order, HubMethod::Order)
            | (Self::Balance, HubMethod::Balance) => Route::Deliver,

            (Self::Ticker, HubMethod::Heartbeat | HubMethod::Trade)
            | (Self::OrderBook | Self::Order, HubMethod::Heartbeat) => Route::Liveness,

            (Self::Order, HubMethod::AuthenticationExpiring) => Route::RefreshAuth,

            (
                Self::Ticker,
                HubMethod::OrderBook
                | HubMethod::Order
                | HubMethod::Balance
                | HubMethod::AuthenticationExpiring,
            )
            | (
                Self::OrderBook,
                HubMethod::Ticker
                | HubMethod::Trade
                | HubMethod::Order
                | HubMethod::Balance
                | HubMethod::AuthenticationExpiring,
            )
            | (
                Self::Order,
                HubMethod::Ticker | HubMethod::Trade | HubMethod::OrderBook | HubMethod::Balance,
            )
            | (
                Self::Balance,
                HubMethod::Heartbeat
                | HubMethod::Ticker
                | HubMethod::Trade
                | HubMethod::OrderBook
                | HubMethod::Order
                | HubMethod::AuthenticationExpiring,
            ) => Route::Ignore,
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Hub Methods
// =============================================================================

/// Server-pushed method names understood by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HubMethod {
    /// Keep-alive, carries no payload.
    Heartbeat,
    /// Ticker delta.
    Ticker,
    /// Trade print.
    Trade,
    /// Order book delta.
    OrderBook,
    /// Order delta.
    Order,
    /// Balance delta.
    Balance,
    /// The account authentication is about to lapse.
    AuthenticationExpiring,
}

impl HubMethod {
    /// Parse a method name as sent by the hub. Matching is case-insensitive.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        [
            Self::Heartbeat,
            Self::Ticker,
            Self::Trade,
            Self::OrderBook,
            Self::Order,
            Self::Balance,
            Self::AuthenticationExpiring,
        ]
        .into_iter()
        .find(|method| method.wire_name().eq_ignore_ascii_case(name))
    }

    /// Method name on the wire.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Ticker => "ticker",
            Self::Trade => "trade",
            Self::OrderBook => "orderBook",
            Self::Order => "order",
            Self::Balance => "balance",
            Self::AuthenticationExpiring => "authenticationExpiring",
        }
    }
}

/// Dispatcher action for one accepted push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Decode every payload and deliver it to the consumer.
    Deliver,
    /// Only counts as feed activity.
    Liveness,
    /// Counts as activity and asks the session to re-authenticate now.
    RefreshAuth,
    /// Not handled by this feed.
    Ignore,
}

impl Route {
    /// Whether the push counts as activity for the liveness monitor.
    #[must_use]
    pub const fn is_activity(self) -> bool {
        !matches!(self, Self::Ignore)
    }
}

// =============================================================================
// Channel Names
// =============================================================================

/// Channel names passed to the hub's `Subscribe` method.
pub mod channels {
    /// Keep-alive channel.
    pub const HEARTBEAT: &str = "heartbeat";
    /// Account order channel.
    pub const ORDER: &str = "order";
    /// Account balance channel.
    pub const BALANCE: &str = "balance";

    /// Ticker channel for `market`.
    #[must_use]
    pub fn ticker(market: &str) -> String {
        format!("ticker_{market}")
    }

    /// Trade channel for `market`.
    #[must_use]
    pub fn trade(market: &str) -> String {
        format!("trade_{market}")
    }

    /// Order book channel for `market` at `depth` levels.
    #[must_use]
    pub fn orderbook(market: &str, depth: u32) -> String {
        format!("orderbook_{market}_{depth}")
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle of one physical hub connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Connect in flight.
    Connecting,
    /// Connected, no subscriptions yet.
    Connected,
    /// Subscribe succeeded.
    Subscribed,
    /// Authenticate call in flight.
    Authenticating,
    /// Close in progress.
    Closing,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected | Self::Disconnected)
                | (
                    Self::Connected,
                    Self::Subscribed | Self::Authenticating | Self::Closing | Self::Disconnected
                )
                | (
                    Self::Subscribed,
                    Self::Authenticating | Self::Closing | Self::Disconnected
                )
                | (
                    Self::Authenticating,
                    Self::Connected | Self::Subscribed | Self::Closing | Self::Disconnected
                )
                | (Self::Closing, Self::Disconnected)
        )
    }
}

/// Channels a session is subscribed to.
pub type Subscriptions = BTreeSet<String>;
