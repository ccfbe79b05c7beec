//! Tracing integration for structured logging and spans.

use tracing::{Level, Span, span};

/// Create a span covering a whole stage.
///
/// # Example
///
/// ```rust,ignore
/// use iterly::observability::span_stage;
///
/// let span = span_stage("fetch", "transform");
/// let _guard = span.enter();
/// // Pulls issued here are attributed to the stage...
/// ```
#[inline]
pub fn span_stage(stage: &str, kind: &str) -> Span {
    span!(Level::DEBUG, "stage", stage = %stage, kind = %kind)
}

/// Create a span for one job (pull plus processing).
#[inline]
pub fn span_job(stage: &str, job: u64, index: u64) -> Span {
    span!(Level::TRACE, "job", stage = %stage, job = job, index = index)
}

/// Log that a stage observed the end of its upstream.
#[inline]
pub fn trace_exhausted(stage: &str, issued: u64) {
    tracing::debug!(stage = %stage, issued = issued, "upstream exhausted");
}

/// Log a failed slot.
#[inline]
pub fn trace_failure(stage: &str, job: u64, error: &dyn std::error::Error) {
    tracing::debug!(stage = %stage, job = job, error = %error, "slot failed");
}

/// Log a stage being cancelled.
#[inline]
pub fn trace_cancelled(stage: &str) {
    tracing::debug!(stage = %stage, "stage cancelled");
}
