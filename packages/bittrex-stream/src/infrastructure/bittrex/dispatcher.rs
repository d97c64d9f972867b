//! Push Dispatcher
//!
//! Turns raw server pushes into feed events. One dispatcher is bound to one
//! feed session; it filters by hub, routes by method through the feed's
//! routing table, decodes every payload of a delivering push, and hands the
//! results to [`Delivery`].
//!
//! Runs on the transport's callback path and never blocks.

use std::sync::Arc;

use tokio::sync::Notify;

use super::codec;
use super::delivery::{Delivery, Offer};
use super::liveness::LivenessState;
use crate::application::ports::{PushHandler, ServerPush};
use crate::domain::events::FeedEvent;
use crate::domain::feed::{HubMethod, Route};
use crate::infrastructure::metrics;

/// Routes pushes for the feed whose event type is `E`.
pub struct Dispatcher<E: FeedEvent> {
    hub: String,
    delivery: Delivery<E>,
    liveness: Arc<LivenessState>,
    auth_expiring: Arc<Notify>,
}

impl<E: FeedEvent> Dispatcher<E> {
    /// Create a dispatcher for pushes from `hub`.
    #[must_use]
    pub fn new(
        hub: impl Into<String>,
        delivery: Delivery<E>,
        liveness: Arc<LivenessState>,
        auth_expiring: Arc<Notify>,
    ) -> Self {
        Self {
            hub: hub.into(),
            delivery,
            liveness,
            auth_expiring,
        }
    }

    /// Handle one push.
    pub fn on_push(&self, push: ServerPush) {
        if !push.hub.eq_ignore_ascii_case(&self.hub) {
            tracing::trace!(feed = %E::FEED, hub = %push.hub, "push from foreign hub ignored");
            return;
        }

        let Some(method) = HubMethod::from_wire(&push.method) else {
            tracing::debug!(feed = %E::FEED, method = %push.method, "unknown hub method ignored");
            metrics::record_push_ignored(E::FEED);
            return;
        };

        let route = E::FEED.route(method);
        if route.is_activity() {
            self.liveness.touch();
        }

        match route {
            Route::Deliver => self.deliver(&push.payloads),
            Route::RefreshAuth => {
                tracing::info!(feed = %E::FEED, "authentication expiring");
                self.auth_expiring.notify_one();
            }
            Route::Liveness => {}
            Route::Ignore => {
                tracing::debug!(feed = %E::FEED, method = %push.method, "push not handled by feed");
                metrics::record_push_ignored(E::FEED);
            }
        }
    }

    fn deliver(&self, payloads: &[String]) {
        for payload in payloads {
            match codec::decode::<E>(payload) {
                Ok(event) => {
                    if self.delivery.offer(event) == Offer::ConsumerGone {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(feed = %E::FEED, stage = e.stage(), error = %e, "dropping undecodable payload");
                    metrics::record_decode_error(E::FEED, e.stage());
                }
            }
        }
    }

    /// Convert into the callback registered with the transport.
    #[must_use]
    pub fn into_handler(self) -> PushHandler {
        Arc::new(move |push| self.on_push(push))
    }
}
