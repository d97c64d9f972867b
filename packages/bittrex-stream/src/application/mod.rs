//! Application Layer - Port definitions.
//!
//! Contracts the streaming core expects from the hub transport. The
//! transport's framing and handshake live behind these traits.

/// Port interfaces for the duplex hub transport.
pub mod ports;
