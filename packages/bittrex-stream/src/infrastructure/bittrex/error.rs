//! Feed Termination Errors

use std::time::Duration;

use thiserror::Error;

use super::auth::AuthError;
use crate::application::ports::TransportError;
use crate::domain::feed::FeedKind;
use crate::infrastructure::config::ConfigError;

/// Why a feed stopped. Every entrypoint ends with one of these.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// Missing or invalid configuration, such as absent credentials.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The connect attempt did not finish in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The connector reported a failure.
    #[error("connect failed: {0}")]
    Connect(#[source] TransportError),

    /// The `Subscribe` call failed or a channel was refused.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// Authentication failed, initially or on refresh.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// No activity for longer than the staleness threshold.
    #[error("{feed} feed silent for {idle:?}")]
    FeedTimeout {
        /// Feed that went stale.
        feed: FeedKind,
        /// Observed idle time.
        idle: Duration,
    },

    /// The transport reported a disconnect.
    #[error("connection lost")]
    Disconnected,

    /// The caller's stop signal fired.
    #[error("stopped by caller")]
    Stopped,

    /// The consumer dropped its receiver.
    #[error("consumer closed")]
    ConsumerClosed,

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl StreamError {
    /// Whether restarting the feed may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout(_)
                | Self::Connect(_)
                | Self::FeedTimeout { .. }
                | Self::Disconnected
                | Self::Transport(_)
        )
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::Connect(_) => "connect",
            Self::Subscribe(_) => "subscribe",
            Self::Auth(_) => "auth",
            Self::FeedTimeout { .. } => "feed_timeout",
            Self::Disconnected => "disconnected",
            Self::Stopped => "stopped",
            Self::ConsumerClosed => "consumer_closed",
            Self::Transport(_) => "transport",
        }
    }
}
