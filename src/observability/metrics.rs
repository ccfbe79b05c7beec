//! Metrics collection using metrics-rs.

use metrics::{Counter, Gauge, Unit, counter, gauge};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Error;

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const JOBS_ISSUED: &str = "iterly_jobs_issued";
const JOBS_DELIVERED: &str = "iterly_jobs_delivered";
const JOBS_SKIPPED: &str = "iterly_jobs_skipped";
const JOBS_FAILED: &str = "iterly_jobs_failed";
const JOBS_CANCELLED: &str = "iterly_jobs_cancelled";
const JOBS_IN_FLIGHT: &str = "iterly_jobs_in_flight";
const WINDOWS_FOLDED: &str = "iterly_windows_folded";

/// Initialize metrics descriptions.
///
/// Call this once at application startup before using any metrics.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(
        JOBS_ISSUED,
        Unit::Count,
        "Jobs issued, one per upstream pull"
    );
    metrics::describe_counter!(
        JOBS_DELIVERED,
        Unit::Count,
        "Job results handed to waiting tickets"
    );
    metrics::describe_counter!(
        JOBS_SKIPPED,
        Unit::Count,
        "Jobs discarded without consuming a ticket (rejected items)"
    );
    metrics::describe_counter!(
        JOBS_FAILED,
        Unit::Count,
        "Jobs that settled with an upstream or function failure"
    );
    metrics::describe_counter!(
        JOBS_CANCELLED,
        Unit::Count,
        "Jobs interrupted by stage cancellation"
    );
    metrics::describe_gauge!(
        JOBS_IN_FLIGHT,
        Unit::Count,
        "Jobs issued but not yet settled"
    );
    metrics::describe_counter!(
        WINDOWS_FOLDED,
        Unit::Count,
        "Aggregation windows folded into a result"
    );
}

/// Metrics handles for one stage, labelled with the stage name.
#[derive(Clone)]
pub struct StageMetrics {
    stage: String,
    issued: Counter,
    delivered: Counter,
    skipped: Counter,
    failed: Counter,
    cancelled: Counter,
    in_flight: Gauge,
    windows: Counter,
}

impl StageMetrics {
    /// Create the metric handles for a stage.
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            issued: counter!(JOBS_ISSUED, "stage" => stage.to_string()),
            delivered: counter!(JOBS_DELIVERED, "stage" => stage.to_string()),
            skipped: counter!(JOBS_SKIPPED, "stage" => stage.to_string()),
            failed: counter!(JOBS_FAILED, "stage" => stage.to_string()),
            cancelled: counter!(JOBS_CANCELLED, "stage" => stage.to_string()),
            in_flight: gauge!(JOBS_IN_FLIGHT, "stage" => stage.to_string()),
            windows: counter!(WINDOWS_FOLDED, "stage" => stage.to_string()),
        }
    }

    /// Record a newly issued job.
    #[inline]
    pub fn record_issued(&self) {
        self.issued.increment(1);
        self.in_flight.increment(1.0);
    }

    /// Record a job that settled, with the error it settled with, if any.
    ///
    /// Cancellation is counted apart from failures.
    #[inline]
    pub fn record_settled(&self, error: Option<&Error>) {
        self.in_flight.decrement(1.0);
        match error {
            Some(err) if err.is_cancelled() => self.cancelled.increment(1),
            Some(_) => self.failed.increment(1),
            None => {}
        }
    }

    /// Record a result handed to a ticket.
    #[inline]
    pub fn record_delivered(&self) {
        self.delivered.increment(1);
    }

    /// Record a discarded job.
    #[inline]
    pub fn record_skipped(&self) {
        self.skipped.increment(1);
    }

    /// Record a folded aggregation window.
    #[inline]
    pub fn record_window(&self) {
        self.windows.increment(1);
    }

    /// Get the stage name.
    pub fn stage(&self) -> &str {
        &self.stage
    }
}
