//! Hub Authentication
//!
//! Account feeds (order, balance) require the connection to be authenticated
//! before subscribing and periodically afterwards.
//!
//! # Authentication Flow
//!
//! 1. Sign `timestamp ‖ nonce` with the API secret
//! 2. Invoke `Authenticate(apiKey, timestamp, nonce, signature)` on the hub
//! 3. Receive `{"Success":true,"ErrorCode":null}` or a failure code
//!
//! The hub pushes `authenticationExpiring` shortly before the grant lapses.
//! Re-running the same flow on the open connection extends it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::signature::ChallengeSignature;
use crate::application::ports::{HubConnection, TransportError};
use crate::domain::feed::FeedKind;
use crate::infrastructure::config::Credentials;
use crate::infrastructure::metrics;

/// Remote method name.
pub const AUTHENTICATE_METHOD: &str = "Authenticate";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during authentication.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The hub answered with `Success: false`.
    #[error("authentication rejected: {}", code.as_deref().unwrap_or("no error code"))]
    Rejected {
        /// Error code reported by the hub, if any.
        code: Option<String>,
    },

    /// The `Authenticate` call itself failed.
    #[error("authenticate call failed: {0}")]
    Invoke(#[from] TransportError),

    /// The hub's answer could not be parsed.
    #[error("invalid authenticate response: {0}")]
    InvalidResponse(String),
}

// =============================================================================
// Hub Responses
// =============================================================================

/// `{Success, ErrorCode}` result returned by hub methods.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HubResponse {
    /// Whether the call succeeded.
    #[serde(rename = "Success")]
    pub success: bool,
    /// Failure code, null on success.
    #[serde(rename = "ErrorCode", default)]
    pub error_code: Option<Value>,
}

impl HubResponse {
    /// Error code rendered as text.
    #[must_use]
    pub fn error_code(&self) -> Option<String> {
        match &self.error_code {
            None | Some(Value::Null) => None,
            Some(Value::String(code)) => Some(code.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Interpret an `Authenticate` response.
///
/// # Errors
///
/// Returns [`AuthError::Rejected`] for `Success: false` and
/// [`AuthError::InvalidResponse`] for anything that is not a response object.
pub fn check_auth_response(value: &Value) -> Result<(), AuthError> {
    let response = HubResponse::deserialize(value)
        .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

    if response.success {
        Ok(())
    } else {
        Err(AuthError::Rejected {
            code: response.error_code(),
        })
    }
}

// =============================================================================
// Authenticator
// =============================================================================

/// Signs and sends authentication challenges for one feed session.
#[derive(Debug)]
pub struct Authenticator {
    feed: FeedKind,
    hub: String,
    credentials: Arc<Credentials>,
    completed: AtomicU64,
}

impl Authenticator {
    /// Create an authenticator.
    #[must_use]
    pub fn new(feed: FeedKind, hub: impl Into<String>, credentials: Arc<Credentials>) -> Self {
        Self {
            feed,
            hub: hub.into(),
            credentials,
            completed: AtomicU64::new(0),
        }
    }

    /// Authenticate `connection` with a freshly signed challenge.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the hub rejects the signature.
    pub async fn authenticate(&self, connection: &dyn HubConnection) -> Result<(), AuthError> {
        let challenge = ChallengeSignature::new(&self.credentials);
        let args = challenge.auth_args(&self.credentials);

        let result = match connection.invoke(&self.hub, AUTHENTICATE_METHOD, args).await {
            Ok(value) => check_auth_response(&value),
            Err(e) => Err(AuthError::Invoke(e)),
        };

        metrics::record_auth(self.feed, result.is_ok());
        match &result {
            Ok(()) => {
                let count = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::info!(feed = %self.feed, count, "authenticated");
            }
            Err(e) => tracing::warn!(feed = %self.feed, error = %e, "authentication failed"),
        }
        result
    }

    /// Number of successful authentications so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}
