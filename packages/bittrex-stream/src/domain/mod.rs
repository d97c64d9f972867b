//! Domain Layer - Feed vocabulary and event types.
//!
//! Pure types with no I/O: the routing table for server-pushed methods,
//! the session lifecycle, and the typed deltas each feed produces.

/// Feed kinds, hub methods, routing and session state.
pub mod feed;

/// Typed events decoded from hub payloads.
pub mod events;
