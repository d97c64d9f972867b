//! Tracing Subscriber Setup
//!
//! Installs a `tracing-subscriber` fmt layer filtered by an [`EnvFilter`].
//! Library code only emits events; calling [`init`] is up to the embedding
//! application (or a test that wants to see logs).
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard filter directives, merged with the defaults
//! - `BITTREX_STREAM_LOG`: level for this crate (default: `info`)
//! - `BITTREX_STREAM_LOG_ANSI`: set to "false" to disable colors
//!
//! # Usage
//!
//! ```ignore
//! use bittrex_stream::infrastructure::telemetry;
//!
//! telemetry::init();
//! tracing::info!("starting feeds");
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default level for this crate's events.
const DEFAULT_LEVEL: &str = "info";

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Level for the `bittrex_stream` target.
    pub level: String,
    /// Whether to emit ANSI colors.
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let level = std::env::var("BITTREX_STREAM_LOG").unwrap_or_else(|_| DEFAULT_LEVEL.to_string());
        let ansi = std::env::var("BITTREX_STREAM_LOG_ANSI")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        Self { level, ansi }
    }

    /// Filter built from `RUST_LOG` plus this crate's level.
    ///
    /// An unparseable level falls back to `info`.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn env_filter(&self) -> EnvFilter {
        let directive = format!("bittrex_stream={}", self.level)
            .parse()
            .unwrap_or_else(|_| {
                "bittrex_stream=info"
                    .parse()
                    .expect("static directive 'bittrex_stream=info' is valid")
            });

        EnvFilter::from_default_env().add_directive(directive)
    }
}

/// Initialize logging from the environment.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    init_with_config(&TelemetryConfig::from_env())
}

/// Initialize logging with a custom configuration.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_with_config(config: &TelemetryConfig) -> bool {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(config.ansi);

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

// =============================================================================
// Tests
// =============================================================================
