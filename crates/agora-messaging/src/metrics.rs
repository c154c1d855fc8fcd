//! Metrics for broker traffic.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! binary installs a recorder.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Metric names for the messaging backbone.
pub mod names {
    /// Total events published.
    pub const PUBLISHED_TOTAL: &str = "agora_messaging_published_total";
    /// Total deliveries settled, labelled by outcome.
    pub const CONSUMED_TOTAL: &str = "agora_messaging_consumed_total";
    /// Total handler errors and panics.
    pub const HANDLER_FAILURES_TOTAL: &str = "agora_messaging_handler_failures_total";
    /// Total broker connection attempts.
    pub const CONNECT_ATTEMPTS_TOTAL: &str = "agora_messaging_connect_attempts_total";
    /// Handler execution duration in seconds.
    pub const HANDLER_DURATION_SECONDS: &str = "agora_messaging_handler_duration_seconds";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::PUBLISHED_TOTAL, "Total number of events published");
    describe_counter!(
        names::CONSUMED_TOTAL,
        "Total number of deliveries settled, by outcome"
    );
    describe_counter!(
        names::HANDLER_FAILURES_TOTAL,
        "Total number of event handler errors and panics"
    );
    describe_counter!(
        names::CONNECT_ATTEMPTS_TOTAL,
        "Total number of broker connection attempts"
    );
    describe_histogram!(
        names::HANDLER_DURATION_SECONDS,
        "Event handler execution duration in seconds"
    );
}

/// Messaging metrics recorder.
#[derive(Clone)]
pub struct MessagingMetrics;

impl MessagingMetrics {
    /// Record an event published.
    pub fn event_published(routing_key: &str) {
        counter!(names::PUBLISHED_TOTAL, "routing_key" => routing_key.to_string()).increment(1);
    }

    /// Record a delivery settled with the given outcome (`ack`, `requeue`, `drop`).
    pub fn event_consumed(routing_key: &str, outcome: &'static str) {
        counter!(
            names::CONSUMED_TOTAL,
            "routing_key" => routing_key.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }

    /// Record a handler failure (`error` or `panic`).
    pub fn handler_failed(routing_key: &str, kind: &'static str) {
        counter!(
            names::HANDLER_FAILURES_TOTAL,
            "routing_key" => routing_key.to_string(),
            "kind" => kind
        )
        .increment(1);
    }

    /// Record how long a handler ran.
    pub fn handler_duration(routing_key: &str, duration: Duration) {
        histogram!(
            names::HANDLER_DURATION_SECONDS,
            "routing_key" => routing_key.to_string()
        )
        .record(duration.as_secs_f64());
    }

    /// Record a broker connection attempt.
    pub fn connect_attempt(success: bool) {
        counter!(
            names::CONNECT_ATTEMPTS_TOTAL,
            "result" => if success { "success" } else { "failure" }
        )
        .increment(1);
    }
}
