//! Streaming Entrypoints
//!
//! [`StreamClient`] runs one feed per call. Each call owns a fresh hub
//! connection, routes its pushes to the caller's channel and only returns
//! once the feed is over. The returned error says why.
//!
//! # Feeds
//!
//! | entrypoint                    | channels                        | connect timeout | liveness | re-auth |
//! |-------------------------------|---------------------------------|-----------------|----------|---------|
//! | `subscribe_ticker_updates`    | heartbeat, ticker_M, trade_M    | 5 s             | yes      | no      |
//! | `subscribe_orderbook_updates` | heartbeat, orderbook_M_25       | 5 s             | yes      | no      |
//! | `subscribe_order_updates`     | heartbeat, order                | 15 s            | opt-in   | yes     |
//! | `subscribe_balance_updates`   | balance                         | 15 s            | opt-in   | yes     |
//!
//! Timeouts, intervals and depth come from [`StreamSettings`].

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::auth::Authenticator;
use super::delivery::Delivery;
use super::dispatcher::Dispatcher;
use super::error::StreamError;
use super::liveness::{LivenessConfig, LivenessMonitor, LivenessState};
use super::session::FeedSession;
use crate::application::ports::HubConnector;
use crate::domain::events::{BalanceEvent, FeedEvent, OrderBookEvent, OrderEvent, TickerEvent};
use crate::domain::feed::{FeedKind, channels};
use crate::infrastructure::config::{ConfigError, Credentials, StreamSettings};
use crate::infrastructure::metrics;

/// Everything that differs between feeds.
#[derive(Debug, Clone)]
struct FeedProfile {
    feed: FeedKind,
    channels: Vec<String>,
    connect_timeout: Duration,
    liveness: Option<LivenessConfig>,
    reauth_interval: Option<Duration>,
}

/// Client for the Bittrex push hub.
///
/// Cheap to share; every entrypoint call opens its own connection.
///
/// # Example
///
/// ```rust,ignore
/// let client = StreamClient::new(connector, StreamSettings::from_env());
/// let (tx, mut rx) = tokio::sync::mpsc::channel(256);
///
/// tokio::spawn(async move {
///     let Err(e) = client.subscribe_ticker_updates("BTC-USDT", tx).await;
///     tracing::warn!(error = %e, "ticker feed ended");
/// });
///
/// while let Some(ticker) = rx.recv().await {
///     println!("{} bid {} ask {}", ticker.symbol, ticker.bid_rate, ticker.ask_rate);
/// }
/// ```
#[derive(Clone)]
pub struct StreamClient {
    connector: Arc<dyn HubConnector>,
    settings: StreamSettings,
    credentials: Option<Arc<Credentials>>,
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("settings", &self.settings)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl StreamClient {
    /// Create a client for public feeds only.
    #[must_use]
    pub fn new(connector: Arc<dyn HubConnector>, settings: StreamSettings) -> Self {
        Self {
            connector,
            settings,
            credentials: None,
        }
    }

    /// Attach credentials for the order and balance feeds.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(Arc::new(credentials));
        self
    }

    /// Settings in use.
    #[must_use]
    pub const fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    // =========================================================================
    // Entrypoints
    // =========================================================================

    /// Stream ticker updates for `market` into `out`.
    ///
    /// # Errors
    ///
    /// Always returns the reason the feed ended.
    pub async fn subscribe_ticker_updates(
        &self,
        market: &str,
        out: mpsc::Sender<TickerEvent>,
    ) -> Result<Infallible, StreamError> {
        let profile = FeedProfile {
            feed: FeedKind::Ticker,
            channels: vec![
                channels::HEARTBEAT.to_string(),
                channels::ticker(market),
                channels::trade(market),
            ],
            connect_timeout: self.settings.public_connect_timeout,
            liveness: Some(LivenessConfig::from_settings(&self.settings)),
            reauth_interval: None,
        };
        self.run_feed(profile, out, None).await
    }

    /// Stream order book deltas for `market` into `out` until `stop` fires.
    ///
    /// # Errors
    ///
    /// Always returns the reason the feed ended, [`StreamError::Stopped`]
    /// after `stop`.
    pub async fn subscribe_orderbook_updates(
        &self,
        market: &str,
        out: mpsc::Sender<OrderBookEvent>,
        stop: CancellationToken,
    ) -> Result<Infallible, StreamError> {
        let profile = FeedProfile {
            feed: FeedKind::OrderBook,
            channels: vec![
                channels::HEARTBEAT.to_string(),
                channels::orderbook(market, self.settings.orderbook_depth),
            ],
            connect_timeout: self.settings.public_connect_timeout,
            liveness: Some(LivenessConfig::from_settings(&self.settings)),
            reauth_interval: None,
        };
        self.run_feed(profile, out, Some(stop)).await
    }

    /// Stream order changes on the account into `out`.
    ///
    /// # Errors
    ///
    /// Always returns the reason the feed ended. Fails immediately with
    /// [`StreamError::Config`] if the client has no credentials.
    pub async fn subscribe_order_updates(
        &self,
        out: mpsc::Sender<OrderEvent>,
    ) -> Result<Infallible, StreamError> {
        let profile = FeedProfile {
            feed: FeedKind::Order,
            channels: vec![channels::HEARTBEAT.to_string(), channels::ORDER.to_string()],
            connect_timeout: self.settings.private_connect_timeout,
            liveness: self.account_liveness(),
            reauth_interval: Some(self.settings.reauth_interval),
        };
        self.run_feed(profile, out, None).await
    }

    /// Stream balance changes on the account into `out`.
    ///
    /// # Errors
    ///
    /// Always returns the reason the feed ended. Fails immediately with
    /// [`StreamError::Config`] if the client has no credentials.
    pub async fn subscribe_balance_updates(
        &self,
        out: mpsc::Sender<BalanceEvent>,
    ) -> Result<Infallible, StreamError> {
        let profile = FeedProfile {
            feed: FeedKind::Balance,
            channels: vec![channels::BALANCE.to_string()],
            connect_timeout: self.settings.private_connect_timeout,
            liveness: self.account_liveness(),
            reauth_interval: Some(self.settings.reauth_interval),
        };
        self.run_feed(profile, out, None).await
    }

    fn account_liveness(&self) -> Option<LivenessConfig> {
        self.settings
            .account_liveness
            .then(|| LivenessConfig::from_settings(&self.settings))
    }

    // =========================================================================
    // Feed Loop
    // =========================================================================

    async fn run_feed<E: FeedEvent>(
        &self,
        profile: FeedProfile,
        out: mpsc::Sender<E>,
        stop: Option<CancellationToken>,
    ) -> Result<Infallible, StreamError> {
        let feed = profile.feed;
        self.settings.validate()?;

        let authenticator = if feed.requires_auth() {
            let credentials = self
                .credentials
                .clone()
                .ok_or(ConfigError::MissingCredentials(feed.as_str()))?;
            Some(Authenticator::new(feed, &self.settings.hub, credentials))
        } else {
            None
        };

        let delivery = Delivery::new(out);
        let liveness = Arc::new(LivenessState::new());
        let auth_expiring = Arc::new(Notify::new());
        let dispatcher = Dispatcher::<E>::new(
            &self.settings.hub,
            delivery.clone(),
            Arc::clone(&liveness),
            Arc::clone(&auth_expiring),
        );

        let mut session = FeedSession::connect(
            feed,
            Arc::clone(&self.connector),
            &self.settings.endpoint(),
            dispatcher.into_handler(),
            profile.connect_timeout,
        )
        .await
        .inspect_err(|e| metrics::record_session_ended(feed, e.reason(), false))?;

        let error = drive(
            &mut session,
            &profile,
            authenticator.as_ref(),
            &delivery,
            &liveness,
            &auth_expiring,
            stop.as_ref(),
        )
        .await;
        session.close().await;

        metrics::record_session_ended(feed, error.reason(), session.is_started());
        tracing::info!(%feed, reason = error.reason(), error = %error, "feed ended");
        Err(error)
    }
}

/// Why the supervising loop woke up.
enum Wake {
    Exit(StreamError),
    Reauthenticate,
}

#[allow(clippy::too_many_arguments)]
async fn drive<E: FeedEvent>(
    session: &mut FeedSession,
    profile: &FeedProfile,
    authenticator: Option<&Authenticator>,
    delivery: &Delivery<E>,
    liveness: &Arc<LivenessState>,
    auth_expiring: &Notify,
    stop: Option<&CancellationToken>,
) -> StreamError {
    let feed = profile.feed;
    let disconnected = session.disconnected();

    if let Some(auth) = authenticator
        && let Err(e) = interruptible(&disconnected, stop, session.authenticate(auth)).await
    {
        return e;
    }
    if let Err(e) = interruptible(&disconnected, stop, session.subscribe(&profile.channels)).await {
        return e;
    }

    session.mark_started();
    liveness.touch();
    let mut monitor = profile
        .liveness
        .map(|config| LivenessMonitor::new(config, Arc::clone(liveness)));
    let mut reauth = match (authenticator, profile.reauth_interval) {
        (Some(_), Some(period)) => {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(interval)
        }
        _ => None,
    };

    loop {
        let wake = tokio::select! {
            () = disconnected.cancelled() => Wake::Exit(StreamError::Disconnected),
            () = cancelled_or_pending(stop) => Wake::Exit(StreamError::Stopped),
            () = delivery.closed() => Wake::Exit(StreamError::ConsumerClosed),
            idle = stale_or_pending(monitor.as_mut()) => Wake::Exit(StreamError::FeedTimeout { feed, idle }),
            () = tick_or_pending(reauth.as_mut()) => Wake::Reauthenticate,
            () = auth_expiring.notified(), if authenticator.is_some() => {
                if let Some(interval) = reauth.as_mut() {
                    interval.reset();
                }
                Wake::Reauthenticate
            }
        };

        match (wake, authenticator) {
            (Wake::Exit(e), _) => return e,
            (Wake::Reauthenticate, Some(auth)) => {
                tracing::debug!(%feed, "refreshing authentication");
                if let Err(e) = interruptible(&disconnected, stop, session.authenticate(auth)).await {
                    return e;
                }
            }
            (Wake::Reauthenticate, None) => {}
        }
    }
}

/// Run a hub call, abandoning it on disconnect or stop.
async fn interruptible<T>(
    disconnected: &CancellationToken,
    stop: Option<&CancellationToken>,
    call: impl Future<Output = Result<T, StreamError>>,
) -> Result<T, StreamError> {
    tokio::select! {
        biased;
        () = disconnected.cancelled() => Err(StreamError::Disconnected),
        () = cancelled_or_pending(stop) => Err(StreamError::Stopped),
        result = call => result,
    }
}

async fn cancelled_or_pending(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn stale_or_pending(monitor: Option<&mut LivenessMonitor>) -> Duration {
    match monitor {
        Some(monitor) => monitor.stale().await,
        None => std::future::pending().await,
    }
}

async fn tick_or_pending(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
