//! HMAC-SHA512 Signatures
//!
//! Bittrex signs with HMAC-SHA512 keyed by the API secret and hex-encodes
//! the digest. Two message layouts share the scheme:
//!
//! 1. REST requests: `timestamp ‖ url ‖ method ‖ hex(sha512(body))`, sent as
//!    the `Api-Key`, `Api-Timestamp`, `Api-Content-Hash` and `Api-Signature`
//!    headers.
//! 2. Hub challenge: `timestamp ‖ nonce`, passed to the remote
//!    `Authenticate` method as `[api_key, timestamp, nonce, signature]`.
//!
//! Timestamps are milliseconds since the Unix epoch rendered in decimal on
//! both paths. The server rejects anything else without a diagnostic.

use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::{Digest, Sha512};
use uuid::Uuid;

use crate::infrastructure::config::Credentials;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "Api-Key";
/// Header carrying the signing timestamp.
pub const API_TIMESTAMP_HEADER: &str = "Api-Timestamp";
/// Header carrying the body hash.
pub const API_CONTENT_HASH_HEADER: &str = "Api-Content-Hash";
/// Header carrying the signature.
pub const API_SIGNATURE_HEADER: &str = "Api-Signature";

/// Hex-encoded HMAC-SHA512 of `message` keyed by `secret`.
#[must_use]
#[allow(clippy::expect_used)]
pub fn sign(secret: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Hex-encoded SHA-512 of a request body.
#[must_use]
pub fn content_hash(body: &[u8]) -> String {
    hex::encode(Sha512::digest(body))
}

/// Current wall-clock time in milliseconds since the epoch.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Inputs of one signature, built per signed operation and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureContext {
    /// A signed REST request.
    Request {
        /// Signing time, ms since epoch.
        timestamp_millis: i64,
        /// Full request URL including query.
        url: String,
        /// HTTP method, upper case.
        method: String,
        /// Hex SHA-512 of the body.
        content_hash: String,
    },
    /// A hub authentication challenge.
    Challenge {
        /// Signing time, ms since epoch.
        timestamp_millis: i64,
        /// Random nonce, unique per signature.
        nonce: String,
    },
}

impl SignatureContext {
    /// The pre-sign string for this context.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Request {
                timestamp_millis,
                url,
                method,
                content_hash,
            } => format!("{timestamp_millis}{url}{method}{content_hash}"),
            Self::Challenge {
                timestamp_millis,
                nonce,
            } => format!("{timestamp_millis}{nonce}"),
        }
    }

    /// Sign this context with `credentials`.
    #[must_use]
    pub fn sign(&self, credentials: &Credentials) -> String {
        sign(credentials.api_secret(), self.message().as_bytes())
    }
}

// =============================================================================
// REST Requests
// =============================================================================

/// Authentication headers for one REST request.
#[derive(Clone, PartialEq, Eq)]
pub struct RestSignature {
    api_key: String,
    timestamp_millis: i64,
    content_hash: String,
    signature: String,
}

impl RestSignature {
    /// Sign a request now.
    #[must_use]
    pub fn new(credentials: &Credentials, method: &str, url: &str, body: &[u8]) -> Self {
        Self::at(credentials, method, url, body, now_millis())
    }

    /// Sign a request at a fixed timestamp.
    #[must_use]
    pub fn at(
        credentials: &Credentials,
        method: &str,
        url: &str,
        body: &[u8],
        timestamp_millis: i64,
    ) -> Self {
        let content_hash = content_hash(body);
        let context = SignatureContext::Request {
            timestamp_millis,
            url: url.to_string(),
            method: method.to_string(),
            content_hash: content_hash.clone(),
        };

        Self {
            api_key: credentials.api_key().to_string(),
            timestamp_millis,
            signature: context.sign(credentials),
            content_hash,
        }
    }

    /// The signature value.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Header name/value pairs to attach to the request.
    #[must_use]
    pub fn headers(&self) -> [(&'static str, String); 4] {
        [
            (API_KEY_HEADER, self.api_key.clone()),
            (API_TIMESTAMP_HEADER, self.timestamp_millis.to_string()),
            (API_CONTENT_HASH_HEADER, self.content_hash.clone()),
            (API_SIGNATURE_HEADER, self.signature.clone()),
        ]
    }
}

impl std::fmt::Debug for RestSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestSignature")
            .field("timestamp_millis", &self.timestamp_millis)
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Hub Challenge
// =============================================================================

/// Signed challenge for the hub's `Authenticate` method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeSignature {
    /// Signing time, ms since epoch.
    pub timestamp_millis: i64,
    /// Nonce included in the signed message.
    pub nonce: String,
    /// Hex signature.
    pub signature: String,
}

impl ChallengeSignature {
    /// Sign a fresh challenge with the current time and a random UUID nonce.
    #[must_use]
    pub fn new(credentials: &Credentials) -> Self {
        Self::at(credentials, now_millis(), Uuid::new_v4().to_string())
    }

    /// Sign a challenge with a fixed timestamp and nonce.
    #[must_use]
    pub fn at(credentials: &Credentials, timestamp_millis: i64, nonce: String) -> Self {
        let signature = SignatureContext::Challenge {
            timestamp_millis,
            nonce: nonce.clone(),
        }
        .sign(credentials);

        Self {
            timestamp_millis,
            nonce,
            signature,
        }
    }

    /// Positional arguments for `Authenticate`.
    #[must_use]
    pub fn auth_args(&self, credentials: &Credentials) -> Vec<Value> {
        vec![
            json!(credentials.api_key()),
            json!(self.timestamp_millis),
            json!(self.nonce),
            json!(self.signature),
        ]
    }
}
