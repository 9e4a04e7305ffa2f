//! # Internal Metrics Module
//!
//! Counters describing the relay's throughput and failures.
//!
//! - **`Metrics`**: a lightweight, cloneable handle the rest of the
//!   application uses to update the predefined counters.
//! - **`LoggingRecorder`**: (Defined in `logging_recorder.rs`) an in-memory
//!   recorder that logs a snapshot of every counter on an interval. Without an
//!   installed recorder all updates are no-ops.

use metrics::{Counter, Unit};

pub mod logging_recorder;

/// The public API for the metrics system.
#[derive(Clone)]
pub struct Metrics {
    pub events_received_total: Counter,
    pub events_malformed_total: Counter,
    pub deliveries_sent_total: Counter,
    pub deliveries_skipped_total: Counter,
    pub deliveries_failed_total: Counter,
    pub transport_reconnects_total: Counter,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// counters with the global recorder.
    pub fn new() -> Self {
        metrics::describe_counter!("events_received_total", Unit::Count, "Messages received from the pub/sub channel.");
        metrics::describe_counter!("events_malformed_total", Unit::Count, "Messages that could not be decoded as a release event and were skipped.");
        metrics::describe_counter!("deliveries_sent_total", Unit::Count, "Payloads accepted by a webhook endpoint.");
        metrics::describe_counter!("deliveries_skipped_total", Unit::Count, "Per-endpoint deliveries skipped because the event had nothing to relay.");
        metrics::describe_counter!("deliveries_failed_total", Unit::Count, "Per-endpoint deliveries that failed with a network error or non-success status.");
        metrics::describe_counter!("transport_reconnects_total", Unit::Count, "Times the pub/sub subscription was re-established after dropping.");

        Self {
            events_received_total: metrics::counter!("events_received_total"),
            events_malformed_total: metrics::counter!("events_malformed_total"),
            deliveries_sent_total: metrics::counter!("deliveries_sent_total"),
            deliveries_skipped_total: metrics::counter!("deliveries_skipped_total"),
            deliveries_failed_total: metrics::counter!("deliveries_failed_total"),
            transport_reconnects_total: metrics::counter!("transport_reconnects_total"),
        }
    }
}
