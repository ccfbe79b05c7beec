//! Observability features: metrics and tracing.
//!
//! ## Metrics
//!
//! iterly exposes the following metrics, labelled by `stage`:
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `iterly_jobs_issued` | Counter | Jobs issued (one per upstream pull) |
//! | `iterly_jobs_delivered` | Counter | Results handed to tickets |
//! | `iterly_jobs_skipped` | Counter | Jobs discarded by a selective stage |
//! | `iterly_jobs_failed` | Counter | Jobs settled with a failure |
//! | `iterly_jobs_cancelled` | Counter | Jobs interrupted by cancellation |
//! | `iterly_jobs_in_flight` | Gauge | Jobs issued but not yet settled |
//! | `iterly_windows_folded` | Counter | Aggregation windows folded |
//!
//! ## Tracing
//!
//! Stages log job issue/settle/delivery at `trace`, exhaustion and
//! cancellation at `debug`. Per-job spans are opt-in through
//! [`StageConfig::with_job_spans`](crate::config::StageConfig::with_job_spans).

mod metrics;
mod tracing_support;

pub use self::metrics::{StageMetrics, init_metrics};
pub use self::tracing_support::{
    span_job, span_stage, trace_cancelled, trace_exhausted, trace_failure,
};
