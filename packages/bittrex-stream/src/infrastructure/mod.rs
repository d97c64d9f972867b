//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations behind the transport ports defined in the
//! application layer, plus configuration and observability.

/// Bittrex push hub adapters (codec, signing, sessions, feeds).
pub mod bittrex;

/// Stream settings and credentials.
pub mod config;

/// Metrics instrumentation through the `metrics` facade.
pub mod metrics;

/// Tracing subscriber setup.
pub mod telemetry;
