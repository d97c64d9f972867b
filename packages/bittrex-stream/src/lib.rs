#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::cast_possible_truncation
    )
)]

//! Bittrex Stream - Realtime Feeds from the Bittrex v3 Push Hub
//!
//! Subscribes to ticker, order book, order and balance feeds over a duplex
//! hub connection, decodes the compressed push payloads into typed events
//! and delivers them to a bounded channel owned by the caller.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Feed vocabulary and event types
//!   - `feed`: Feed kinds, hub methods, routing table, session states
//!   - `events`: Ticker, order book, order and balance deltas
//!
//! - **Application**: Port definitions
//!   - `ports`: Hub connector and connection traits, server pushes
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `bittrex`: Codec, signing, dispatcher, sessions, feed entrypoints
//!   - `config`: Settings and credentials
//!   - `metrics`: Counters through the `metrics` facade
//!   - `telemetry`: Tracing subscriber setup
//!
//! # Data Flow
//!
//! ```text
//!                   push(hub, method, payloads)
//! Hub transport ───────────────────────────────► Dispatcher ──try_send──► consumer channel
//!      ▲                                          │    │
//!      │ invoke(Subscribe / Authenticate)         │    └─ touch ─► LivenessState
//!      │                                          └─ notify ────► auth refresh
//!  FeedSession ◄──── supervising loop (select: disconnect, stale, stop,
//!                                      consumer closed, re-auth tick)
//! ```
//!
//! The hub transport itself (negotiation, framing, keep-alives) is supplied
//! by the caller through [`HubConnector`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Feed vocabulary and event types with no I/O.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::events::{
    BalanceDelta, BalanceEvent, FeedEvent, OrderBookEntry, OrderBookEvent, OrderDelta, OrderEvent,
    TickerEvent,
};
pub use domain::feed::{FeedKind, HubMethod, Route, SessionState};

// Ports
pub use application::ports::{
    HubConnection, HubConnector, HubEndpoint, PushHandler, ServerPush, TransportError,
};

// Streaming
pub use infrastructure::bittrex::{
    AuthError, DecodeError, ReconnectConfig, RestSignature, StreamClient, StreamError, Supervisor,
};

// Config
pub use infrastructure::config::{ConfigError, Credentials, StreamSettings};

// Metrics
pub use infrastructure::metrics::describe_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, init as init_telemetry};
