//! Port Interfaces
//!
//! The duplex hub transport is an external collaborator. The streaming
//! core only needs four capabilities from it:
//!
//! - connect to a hub endpoint, registering a push callback
//! - invoke a remote hub method and await its response
//! - observe a one-shot disconnect signal
//! - close the connection
//!
//! ## Threading
//!
//! The transport calls the [`PushHandler`] from whatever execution context it
//! uses to read the socket. Handlers must not block or await.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Where to connect: scheme, host and the hub names to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubEndpoint {
    /// URL scheme used for negotiation, `https` in production.
    pub scheme: String,
    /// Host of the socket service.
    pub host: String,
    /// Hubs to join on the connection.
    pub hubs: Vec<String>,
}

/// One server-pushed method call as produced by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPush {
    /// Hub that emitted the call.
    pub hub: String,
    /// Method name.
    pub method: String,
    /// Raw argument texts, one encoded payload each.
    pub payloads: Vec<String>,
}

impl ServerPush {
    /// Create a push with the given payloads.
    #[must_use]
    pub fn new(hub: impl Into<String>, method: impl Into<String>, payloads: Vec<String>) -> Self {
        Self {
            hub: hub.into(),
            method: method.into(),
            payloads,
        }
    }
}

/// Callback the transport invokes for each server push.
pub type PushHandler = Arc<dyn Fn(ServerPush) + Send + Sync>;

/// Errors surfaced by a transport implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Establishing the connection failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A remote method invocation failed.
    #[error("invoke {method} failed: {message}")]
    Invoke {
        /// Remote method name.
        method: String,
        /// Transport or hub error text.
        message: String,
    },

    /// The connection is no longer usable.
    #[error("connection closed")]
    Closed,

    /// The operation was abandoned through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,
}

/// An established, exclusively owned hub connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HubConnection: Send + Sync {
    /// Invoke `method` on `hub` with positional `args`.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if the call cannot be delivered or the
    /// hub answers with an error.
    async fn invoke(
        &self,
        hub: &str,
        method: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, TransportError>;

    /// One-shot signal cancelled when the transport observes a disconnect.
    fn disconnected(&self) -> CancellationToken;

    /// Release the connection. Must tolerate being called after a disconnect.
    async fn close(&self);
}

/// Factory for fresh connections, one per feed session.
#[async_trait]
pub trait HubConnector: Send + Sync {
    /// Connect to `endpoint`, routing server pushes to `on_push`.
    ///
    /// Implementations should abandon the attempt once `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if the connection cannot be established.
    async fn connect(
        &self,
        endpoint: &HubEndpoint,
        on_push: PushHandler,
        cancel: CancellationToken,
    ) -> Result<Box<dyn HubConnection>, TransportError>;
}
