//! Feed Restart Supervision
//!
//! Feed sessions never reconnect on their own. [`Supervisor`] re-runs a feed
//! after a retryable failure, waiting out an exponential backoff with jitter
//! between attempts. Failures that a restart cannot fix (bad credentials,
//! refused channels, caller stop, consumer gone) end supervision at once.

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use super::error::StreamError;
use crate::domain::feed::FeedKind;
use crate::infrastructure::metrics;

/// Configuration for restart behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first restart.
    pub initial_delay: Duration,
    /// Upper bound on the delay between restarts.
    pub max_delay: Duration,
    /// Backoff multiplier (2.0 doubles the delay each attempt).
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Maximum consecutive restarts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(64),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        jitter_factor: f64,
        max_attempts: u32,
    ) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
            jitter_factor,
            max_attempts,
        }
    }
}

/// Exponential backoff with jitter.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Next delay, or `None` once max attempts are used up.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        self.attempt_count += 1;
        let delay_with_jitter = self.apply_jitter(self.current_delay);

        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        Some(delay_with_jitter)
    }

    /// Back to the initial delay after a session that got going.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Restarts used since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another restart is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// Re-runs a feed until it fails in a way a restart cannot fix.
#[derive(Debug)]
pub struct Supervisor {
    feed: FeedKind,
    policy: ReconnectPolicy,
    stop: CancellationToken,
}

impl Supervisor {
    /// Create a supervisor for `feed`. Cancelling `stop` ends supervision
    /// during a backoff wait.
    #[must_use]
    pub const fn new(feed: FeedKind, config: ReconnectConfig, stop: CancellationToken) -> Self {
        Self {
            feed,
            policy: ReconnectPolicy::new(config),
            stop,
        }
    }

    /// Run `start()` repeatedly and return the error that ended supervision.
    pub async fn run<F, Fut>(mut self, mut start: F) -> StreamError
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Infallible, StreamError>>,
    {
        loop {
            let error = match start().await {
                Ok(never) => match never {},
                Err(e) => e,
            };

            if !error.is_retryable() {
                tracing::info!(feed = %self.feed, error = %error, "feed ended");
                return error;
            }

            // These only happen after the session was connected.
            if matches!(error, StreamError::Disconnected | StreamError::FeedTimeout { .. }) {
                self.policy.reset();
            }

            let Some(delay) = self.policy.next_delay() else {
                tracing::error!(
                    feed = %self.feed,
                    attempts = self.policy.attempt_count(),
                    error = %error,
                    "giving up after max restart attempts"
                );
                return error;
            };

            tracing::warn!(
                feed = %self.feed,
                attempt = self.policy.attempt_count(),
                delay_ms = delay.as_millis(),
                error = %error,
                "restarting feed"
            );
            metrics::record_reconnect(self.feed);

            tokio::select! {
                () = self.stop.cancelled() => return StreamError::Stopped,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
