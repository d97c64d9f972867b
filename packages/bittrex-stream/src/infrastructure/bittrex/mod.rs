//! Bittrex Push Hub Adapters
//!
//! Everything between the hub transport and the consumer's channel:
//!
//! - **Signature**: HMAC-SHA512 for REST headers and the hub challenge
//! - **Codec**: base64 + raw deflate + JSON payload decoding
//! - **Dispatcher**: hub/method routing and lossy delivery
//! - **Session**: connect with timeout, subscribe, authenticate, close
//! - **Stream**: the four feed entrypoints and their supervising loop
//! - **Reconnect**: optional restart supervision with backoff

pub mod auth;
pub mod codec;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod liveness;
pub mod reconnect;
pub mod session;
pub mod signature;
pub mod stream;

pub use auth::{AuthError, Authenticator, HubResponse};
pub use codec::DecodeError;
pub use delivery::{Delivery, Offer};
pub use dispatcher::Dispatcher;
pub use error::StreamError;
pub use liveness::{LivenessConfig, LivenessMonitor, LivenessState};
pub use reconnect::{ReconnectConfig, ReconnectPolicy, Supervisor};
pub use session::FeedSession;
pub use signature::{ChallengeSignature, RestSignature, SignatureContext};
pub use stream::StreamClient;
