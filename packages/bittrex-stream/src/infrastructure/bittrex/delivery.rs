//! Lossy Event Delivery
//!
//! Events are handed to the consumer through a bounded channel without ever
//! waiting. The push callback runs on the transport's read path, so a full
//! channel drops the event instead of stalling the socket.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::events::FeedEvent;
use crate::infrastructure::metrics;

/// Outcome of offering one event to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Queued on the consumer channel.
    Delivered,
    /// Channel was full; the event was discarded.
    DroppedFull,
    /// The consumer dropped its receiver.
    ConsumerGone,
}

/// Non-blocking sender for one feed's events.
#[derive(Debug)]
pub struct Delivery<E> {
    tx: mpsc::Sender<E>,
}

impl<E> Clone for Delivery<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E: FeedEvent> Delivery<E> {
    /// Wrap the consumer's sender.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<E>) -> Self {
        Self { tx }
    }

    /// Offer `event` to the consumer without waiting.
    pub fn offer(&self, event: E) -> Offer {
        match self.tx.try_send(event) {
            Ok(()) => {
                metrics::record_event_delivered(E::FEED);
                Offer::Delivered
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(feed = %E::FEED, "consumer channel full, dropping event");
                metrics::record_event_dropped(E::FEED);
                Offer::DroppedFull
            }
            Err(TrySendError::Closed(_)) => Offer::ConsumerGone,
        }
    }

    /// Resolves once the consumer drops its receiver.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}
