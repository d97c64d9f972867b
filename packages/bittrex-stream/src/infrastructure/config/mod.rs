//! Configuration Module
//!
//! Stream settings and API credentials.

mod settings;

pub use settings::{ConfigError, Credentials, DEFAULT_HOST, DEFAULT_HUB, StreamSettings};
