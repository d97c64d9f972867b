//! Feed Liveness
//!
//! The hub sends a heartbeat push roughly every few seconds on public feeds.
//! Any routed push counts as activity. A monitor wakes on a fixed period and
//! reports the feed stale once it has been silent longer than the threshold.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Liveness check configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessConfig {
    /// Period between staleness checks.
    pub check_interval: Duration,
    /// Silence longer than this is stale.
    pub staleness_threshold: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            staleness_threshold: Duration::from_secs(60),
        }
    }
}

impl LivenessConfig {
    /// Create a configuration with custom values.
    #[must_use]
    pub const fn new(check_interval: Duration, staleness_threshold: Duration) -> Self {
        Self {
            check_interval,
            staleness_threshold,
        }
    }

    /// Configuration from stream settings.
    #[must_use]
    pub const fn from_settings(settings: &crate::StreamSettings) -> Self {
        Self {
            check_interval: settings.liveness_check_interval,
            staleness_threshold: settings.staleness_threshold,
        }
    }
}

/// Last-activity timestamp shared between the push path and the monitor.
#[derive(Debug)]
pub struct LivenessState {
    last_activity: RwLock<Instant>,
}

impl Default for LivenessState {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessState {
    /// Create state with activity recorded now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_activity: RwLock::new(Instant::now()),
        }
    }

    /// Record activity.
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    /// Time since the last recorded activity.
    #[must_use]
    pub fn idle(&self) -> Duration {
        self.last_activity.read().elapsed()
    }
}

/// Periodic staleness check for one session.
#[derive(Debug)]
pub struct LivenessMonitor {
    config: LivenessConfig,
    state: Arc<LivenessState>,
    interval: Interval,
}

impl LivenessMonitor {
    /// Start monitoring `state`. The first check runs one period from now.
    #[must_use]
    pub fn new(config: LivenessConfig, state: Arc<LivenessState>) -> Self {
        let mut interval =
            tokio::time::interval_at(Instant::now() + config.check_interval, config.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            config,
            state,
            interval,
        }
    }

    /// Whether the feed is stale right now. Returns the idle time if so.
    #[must_use]
    pub fn check(&self) -> Option<Duration> {
        let idle = self.state.idle();
        (idle > self.config.staleness_threshold).then_some(idle)
    }

    /// Resolves with the idle time at the first check that finds the feed
    /// stale. Cancel-safe.
    pub async fn stale(&mut self) -> Duration {
        loop {
            self.interval.tick().await;
            if let Some(idle) = self.check() {
                tracing::warn!(
                    idle_secs = idle.as_secs(),
                    threshold_secs = self.config.staleness_threshold.as_secs(),
                    "feed stale"
                );
                return idle;
            }
        }
    }
}
