//! Stream Configuration Settings
//!
//! Hub endpoint, timeouts and intervals for feed sessions, plus the API
//! credentials used for account feeds. Everything has a production default
//! and can be overridden from environment variables.

use std::time::Duration;

use crate::application::ports::HubEndpoint;

/// Default socket host.
pub const DEFAULT_HOST: &str = "socket-v3.bittrex.com";

/// Default hub name.
pub const DEFAULT_HUB: &str = "c3";

/// Bittrex API credentials.
///
/// The secret is kept as raw bytes for HMAC keying and never printed.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: Vec<u8>,
}

impl Credentials {
    /// Create new credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if either key or secret is empty.
    pub fn new(api_key: impl Into<String>, api_secret: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        let api_secret = api_secret.as_ref().to_vec();

        if api_key.is_empty() {
            return Err(ConfigError::EmptyValue("api key".to_string()));
        }
        if api_secret.is_empty() {
            return Err(ConfigError::EmptyValue("api secret".to_string()));
        }

        Ok(Self {
            api_key,
            api_secret,
        })
    }

    /// Create credentials from environment variables.
    ///
    /// Reads `BITTREX_API_KEY` and `BITTREX_API_SECRET`.
    ///
    /// # Errors
    ///
    /// Returns an error if the variables are not set or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("BITTREX_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("BITTREX_API_KEY".to_string()))?;
        let api_secret = std::env::var("BITTREX_API_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("BITTREX_API_SECRET".to_string()))?;

        if api_key.is_empty() {
            return Err(ConfigError::EmptyValue("BITTREX_API_KEY".to_string()));
        }
        if api_secret.is_empty() {
            return Err(ConfigError::EmptyValue("BITTREX_API_SECRET".to_string()));
        }

        Self::new(api_key, api_secret)
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API secret.
    #[must_use]
    pub fn api_secret(&self) -> &[u8] {
        &self.api_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Feed session settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Negotiation scheme.
    pub scheme: String,
    /// Socket host.
    pub host: String,
    /// Hub joined by every session.
    pub hub: String,
    /// Connect timeout for ticker and order book feeds.
    pub public_connect_timeout: Duration,
    /// Connect timeout for order and balance feeds.
    pub private_connect_timeout: Duration,
    /// How often the liveness monitor checks for staleness.
    pub liveness_check_interval: Duration,
    /// Silence longer than this ends a monitored feed.
    pub staleness_threshold: Duration,
    /// Also run the staleness check on order and balance feeds.
    pub account_liveness: bool,
    /// Re-authentication period for account feeds.
    pub reauth_interval: Duration,
    /// Order book depth to subscribe to.
    pub orderbook_depth: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            host: DEFAULT_HOST.to_string(),
            hub: DEFAULT_HUB.to_string(),
            public_connect_timeout: Duration::from_secs(5),
            private_connect_timeout: Duration::from_secs(15),
            liveness_check_interval: Duration::from_secs(60),
            staleness_threshold: Duration::from_secs(60),
            account_liveness: false,
            reauth_interval: Duration::from_secs(5 * 60),
            orderbook_depth: 25,
        }
    }
}

impl StreamSettings {
    /// Create settings from environment variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            scheme: defaults.scheme,
            host: std::env::var("BITTREX_STREAM_HOST").unwrap_or(defaults.host),
            hub: std::env::var("BITTREX_STREAM_HUB").unwrap_or(defaults.hub),
            public_connect_timeout: parse_env_duration_secs(
                "BITTREX_STREAM_PUBLIC_CONNECT_TIMEOUT_SECS",
                defaults.public_connect_timeout,
            ),
            private_connect_timeout: parse_env_duration_secs(
                "BITTREX_STREAM_PRIVATE_CONNECT_TIMEOUT_SECS",
                defaults.private_connect_timeout,
            ),
            liveness_check_interval: parse_env_duration_secs(
                "BITTREX_STREAM_LIVENESS_CHECK_SECS",
                defaults.liveness_check_interval,
            ),
            staleness_threshold: parse_env_duration_secs(
                "BITTREX_STREAM_STALENESS_SECS",
                defaults.staleness_threshold,
            ),
            account_liveness: parse_env_bool(
                "BITTREX_STREAM_ACCOUNT_LIVENESS",
                defaults.account_liveness,
            ),
            reauth_interval: parse_env_duration_secs(
                "BITTREX_STREAM_REAUTH_INTERVAL_SECS",
                defaults.reauth_interval,
            ),
            orderbook_depth: parse_env_u32("BITTREX_STREAM_ORDERBOOK_DEPTH", defaults.orderbook_depth),
        }
    }

    /// Check values a session cannot run without.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyValue`] for an empty host or hub.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyValue("host".to_string()));
        }
        if self.hub.trim().is_empty() {
            return Err(ConfigError::EmptyValue("hub".to_string()));
        }
        Ok(())
    }

    /// Endpoint every feed session connects to.
    #[must_use]
    pub fn endpoint(&self) -> HubEndpoint {
        HubEndpoint {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            hubs: vec![self.hub.clone()],
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// A required value is empty.
    #[error("{0} cannot be empty")]
    EmptyValue(String),
    /// An account feed was requested without credentials.
    #[error("credentials are required for the {0} feed")]
    MissingCredentials(&'static str),
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}
