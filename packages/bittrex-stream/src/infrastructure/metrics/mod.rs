//! Stream Metrics
//!
//! Counters and gauges emitted through the `metrics` facade. The crate does
//! not install a recorder; the embedding application chooses the exporter
//! and calls [`describe_metrics`] once after installing it.
//!
//! # Metrics Categories
//!
//! - **Events**: delivered to and dropped at the consumer channel
//! - **Pushes**: decode failures by stage, pushes ignored by routing
//! - **Sessions**: feed sessions started, ended by reason, active count
//! - **Auth**: authentication attempts by outcome
//! - **Reconnects**: supervisor restarts

use std::sync::Once;

use metrics::{counter, describe_counter, describe_gauge, gauge};

use crate::domain::feed::FeedKind;

static DESCRIBE: Once = Once::new();

// =============================================================================
// Metric Registration
// =============================================================================

/// Register metric descriptions with the installed recorder.
///
/// Safe to call more than once; only the first call registers.
pub fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!(
            "bittrex_stream_events_delivered_total",
            "Events queued on a consumer channel"
        );
        describe_counter!(
            "bittrex_stream_events_dropped_total",
            "Events discarded because the consumer channel was full"
        );
        describe_counter!(
            "bittrex_stream_decode_errors_total",
            "Push payloads that failed to decode, by stage"
        );
        describe_counter!(
            "bittrex_stream_pushes_ignored_total",
            "Pushes not routed by the receiving feed"
        );
        describe_counter!(
            "bittrex_stream_sessions_started_total",
            "Feed sessions that reached the subscribed state"
        );
        describe_counter!(
            "bittrex_stream_sessions_ended_total",
            "Feed sessions that terminated, by reason"
        );
        describe_gauge!(
            "bittrex_stream_active_sessions",
            "Feed sessions currently running"
        );
        describe_counter!(
            "bittrex_stream_auth_total",
            "Hub authentication attempts, by outcome"
        );
        describe_counter!(
            "bittrex_stream_reconnects_total",
            "Feed restarts performed by the supervisor"
        );
    });
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record an event queued for the consumer.
pub fn record_event_delivered(feed: FeedKind) {
    counter!("bittrex_stream_events_delivered_total", "feed" => feed.as_str()).increment(1);
}

/// Record an event dropped on a full channel.
pub fn record_event_dropped(feed: FeedKind) {
    counter!("bittrex_stream_events_dropped_total", "feed" => feed.as_str()).increment(1);
}

/// Record a payload that failed at `stage`.
pub fn record_decode_error(feed: FeedKind, stage: &'static str) {
    counter!(
        "bittrex_stream_decode_errors_total",
        "feed" => feed.as_str(),
        "stage" => stage
    )
    .increment(1);
}

/// Record a push the feed does not handle.
pub fn record_push_ignored(feed: FeedKind) {
    counter!("bittrex_stream_pushes_ignored_total", "feed" => feed.as_str()).increment(1);
}

/// Record a session that finished setup.
pub fn record_session_started(feed: FeedKind) {
    counter!("bittrex_stream_sessions_started_total", "feed" => feed.as_str()).increment(1);
    gauge!("bittrex_stream_active_sessions", "feed" => feed.as_str()).increment(1.0);
}

/// Record a session ending for `reason`.
pub fn record_session_ended(feed: FeedKind, reason: &'static str, was_started: bool) {
    counter!(
        "bittrex_stream_sessions_ended_total",
        "feed" => feed.as_str(),
        "reason" => reason
    )
    .increment(1);
    if was_started {
        gauge!("bittrex_stream_active_sessions", "feed" => feed.as_str()).decrement(1.0);
    }
}

/// Record an authentication attempt.
pub fn record_auth(feed: FeedKind, success: bool) {
    counter!(
        "bittrex_stream_auth_total",
        "feed" => feed.as_str(),
        "outcome" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

/// Record a supervisor restart.
pub fn record_reconnect(feed: FeedKind) {
    counter!("bittrex_stream_reconnects_total", "feed" => feed.as_str()).increment(1);
}

// =============================================================================
// Tests
// =============================================================================
