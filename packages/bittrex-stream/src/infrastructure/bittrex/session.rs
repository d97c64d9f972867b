//! Feed Session
//!
//! Owns one physical hub connection for the lifetime of one feed.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Subscribed -> Closing -> Disconnected
//!                                   |  ^          |  ^
//!                                   v  |          v  |
//!                              Authenticating   Authenticating
//! ```
//!
//! A session never reconnects. A transport disconnect ends it and the caller
//! decides whether to start a new one.
//!
//! Dropping a session that still holds its connection closes the connection
//! on a spawned task, so an aborted feed does not leak it.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::auth::{Authenticator, HubResponse};
use super::error::StreamError;
use crate::application::ports::{
    HubConnection, HubConnector, HubEndpoint, PushHandler, TransportError,
};
use crate::domain::feed::{FeedKind, SessionState, Subscriptions};
use crate::infrastructure::config::ConfigError;
use crate::infrastructure::metrics;

/// Remote method name.
pub const SUBSCRIBE_METHOD: &str = "Subscribe";

type ConnectResult = Result<Box<dyn HubConnection>, TransportError>;

/// One connected feed session.
pub struct FeedSession {
    feed: FeedKind,
    hub: String,
    connection: Option<Box<dyn HubConnection>>,
    disconnected: CancellationToken,
    state: SessionState,
    subscriptions: Subscriptions,
    started: bool,
}

impl std::fmt::Debug for FeedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSession")
            .field("feed", &self.feed)
            .field("hub", &self.hub)
            .field("state", &self.state)
            .field("subscriptions", &self.subscriptions)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl FeedSession {
    /// Connect to `endpoint`, giving up after `timeout`.
    ///
    /// The connect runs on its own task. On timeout its cancellation token
    /// fires, and a connection that still completes afterwards is closed.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::ConnectTimeout`] or [`StreamError::Connect`],
    /// and [`StreamError::Config`] if `endpoint` names no hub.
    pub async fn connect(
        feed: FeedKind,
        connector: Arc<dyn HubConnector>,
        endpoint: &HubEndpoint,
        on_push: PushHandler,
        timeout: Duration,
    ) -> Result<Self, StreamError> {
        let Some(hub) = endpoint.hubs.first().filter(|hub| !hub.is_empty()) else {
            return Err(ConfigError::EmptyValue("hub".to_string()).into());
        };
        let mut session = Self::pending(feed, hub.clone());
        session.set_state(SessionState::Connecting);
        tracing::debug!(%feed, host = %endpoint.host, %hub, "connecting");

        let cancel = CancellationToken::new();
        let mut attempt: JoinHandle<ConnectResult> = {
            let endpoint = endpoint.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { connector.connect(&endpoint, on_push, cancel).await })
        };

        match tokio::time::timeout(timeout, &mut attempt).await {
            Ok(Ok(Ok(connection))) => {
                tracing::info!(%feed, "connected");
                session.attach(connection);
                Ok(session)
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(%feed, error = %e, "connect failed");
                session.set_state(SessionState::Disconnected);
                Err(StreamError::Connect(e))
            }
            Ok(Err(join_error)) => {
                session.set_state(SessionState::Disconnected);
                Err(StreamError::Connect(TransportError::Connect(
                    join_error.to_string(),
                )))
            }
            Err(_) => {
                tracing::warn!(%feed, timeout_ms = timeout.as_millis(), "connect timed out");
                session.set_state(SessionState::Disconnected);
                cancel.cancel();
                tokio::spawn(reap_late_connection(feed, attempt));
                Err(StreamError::ConnectTimeout(timeout))
            }
        }
    }

    /// Wrap an established connection.
    #[must_use]
    pub fn new(feed: FeedKind, hub: impl Into<String>, connection: Box<dyn HubConnection>) -> Self {
        let mut session = Self::pending(feed, hub);
        session.set_state(SessionState::Connecting);
        session.attach(connection);
        session
    }

    fn pending(feed: FeedKind, hub: impl Into<String>) -> Self {
        Self {
            feed,
            hub: hub.into(),
            connection: None,
            disconnected: CancellationToken::new(),
            state: SessionState::Disconnected,
            subscriptions: Subscriptions::new(),
            started: false,
        }
    }

    fn attach(&mut self, connection: Box<dyn HubConnection>) {
        self.disconnected = connection.disconnected();
        self.connection = Some(connection);
        self.set_state(SessionState::Connected);
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Channels subscribed so far.
    #[must_use]
    pub const fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Whether the feed finished setup on this session.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Mark setup as finished. Counted once per session.
    pub fn mark_started(&mut self) {
        if !self.started {
            self.started = true;
            metrics::record_session_started(self.feed);
        }
    }

    /// Fires when the transport observes a disconnect.
    #[must_use]
    pub fn disconnected(&self) -> CancellationToken {
        self.disconnected.clone()
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state.can_transition_to(next) {
            tracing::trace!(feed = %self.feed, from = ?self.state, to = ?next, "session state");
            self.state = next;
        } else {
            tracing::warn!(feed = %self.feed, from = ?self.state, to = ?next, "invalid session transition");
        }
    }

    fn connection(&self) -> Result<&dyn HubConnection, StreamError> {
        if self.disconnected.is_cancelled() {
            return Err(StreamError::Disconnected);
        }
        self.connection
            .as_deref()
            .ok_or(StreamError::Transport(TransportError::Closed))
    }

    /// Subscribe to `channels` in one call.
    ///
    /// The hub answers with one `{Success, ErrorCode}` per channel. Any
    /// refused channel fails the whole call. An answer in another shape is
    /// accepted as-is.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Subscribe`] if the call fails or a channel is
    /// refused.
    pub async fn subscribe(&mut self, channels: &[String]) -> Result<(), StreamError> {
        let connection = self.connection()?;
        let response = connection
            .invoke(&self.hub, SUBSCRIBE_METHOD, vec![json!(channels)])
            .await
            .map_err(|e| StreamError::Subscribe(e.to_string()))?;

        check_subscribe_response(channels, &response)?;

        self.subscriptions.extend(channels.iter().cloned());
        self.set_state(SessionState::Subscribed);
        tracing::info!(feed = %self.feed, ?channels, "subscribed");
        Ok(())
    }

    /// Authenticate the connection, returning to the previous state after.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Auth`] on any failure.
    pub async fn authenticate(&mut self, authenticator: &Authenticator) -> Result<(), StreamError> {
        let resume = self.state;
        self.set_state(SessionState::Authenticating);

        let connection = self.connection()?;
        authenticator.authenticate(connection).await?;

        self.set_state(resume);
        Ok(())
    }

    /// Release the connection. Later calls do nothing.
    pub async fn close(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        self.set_state(SessionState::Closing);
        connection.close().await;
        self.set_state(SessionState::Disconnected);
        tracing::debug!(feed = %self.feed, "session closed");
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        tracing::warn!(feed = %self.feed, state = ?self.state, "session dropped while open");
        metrics::record_session_ended(self.feed, "abandoned", self.started);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { connection.close().await });
            }
            Err(_) => {
                tracing::warn!(feed = %self.feed, "no runtime left to close connection");
            }
        }
    }
}

fn check_subscribe_response(channels: &[String], response: &Value) -> Result<(), StreamError> {
    let Ok(results) = Vec::<HubResponse>::deserialize(response) else {
        return Ok(());
    };

    for (channel, result) in channels.iter().zip(&results) {
        if !result.success {
            return Err(StreamError::Subscribe(format!(
                "{channel} refused: {}",
                result.error_code().unwrap_or_else(|| "no error code".to_string())
            )));
        }
    }
    if let Some(channel) = channels.get(results.len()) {
        return Err(StreamError::Subscribe(format!(
            "{channel} refused: no result for {} of {} channels",
            channels.len() - results.len(),
            channels.len()
        )));
    }
    Ok(())
}

async fn reap_late_connection(feed: FeedKind, attempt: JoinHandle<ConnectResult>) {
    if let Ok(Ok(connection)) = attempt.await {
        tracing::debug!(%feed, "closing connection that completed after timeout");
        connection.close().await;
    }
}
