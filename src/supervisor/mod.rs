//! In-order completion scheduler (reorder buffer).
//!
//! A [`Supervisor`] owns an upstream [`Source`] and two ordered queues:
//!
//! - **jobs**, in issuance order: one per upstream pull, each running an
//!   [`Operation`] on the pulled item in its own task.
//! - **tickets**, in request order: one per call to [`Supervisor::submit`].
//!
//! Jobs settle in any order. Whenever the job at the head of the queue has
//! settled it is popped and its result resolves the ticket at the head of
//! the ticket queue. A job whose operation returns [`Verdict::Skip`] is
//! discarded without consuming a ticket; a replacement job is issued at the
//! moment it settles, so the ticket is eventually served by a later item.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Square;
//!
//! impl Operation<u64> for Square {
//!     type Output = u64;
//!
//!     fn run(&self, item: u64, _job: JobHandle) -> Deferred<Result<Verdict<u64>>> {
//!         Deferred::ok(Verdict::Deliver(item * item))
//!     }
//! }
//!
//! let supervisor = Supervisor::new(from_iter(1..=3u64));
//! let op = Arc::new(Square);
//! let tickets = [supervisor.submit(op.clone()), supervisor.submit(op.clone())];
//! ```

mod job;
mod ticket;

pub use job::{JobHandle, JobId, Operation, Verdict};
pub use ticket::Ticket;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use self::job::{Job, Settled};
use self::ticket::Resolver;
use crate::config::StageConfig;
use crate::error::{Error, Result};
use crate::observability::{
    StageMetrics, span_job, trace_cancelled, trace_exhausted, trace_failure,
};
use crate::sequential::{PullFuture, Sequential};
use crate::source::Source;

/// Snapshot of a supervisor's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    /// Jobs issued with an upstream pull.
    pub issued: u64,
    /// Results handed to tickets.
    pub delivered: u64,
    /// Jobs discarded by [`Verdict::Skip`].
    pub skipped: u64,
    /// Jobs settled with a failure, panics included.
    pub failed: u64,
    /// Jobs interrupted by cancellation.
    pub cancelled: u64,
    /// Jobs whose work is still running.
    pub in_flight: usize,
}

/// Reorder buffer delivering per-item results in issuance order.
///
/// All pulls on the upstream source go through the supervisor. Submitting
/// requires a tokio runtime: each job runs in its own task.
pub struct Supervisor<S: Source, T> {
    core: Arc<Mutex<Core<S, T>>>,
    cancel: CancellationToken,
    cancel_on_drop: bool,
}

struct Core<S, T> {
    stage: Arc<str>,
    upstream: Sequential<S>,
    jobs: VecDeque<Job<T>>,
    tickets: VecDeque<Resolver<T>>,
    next_id: u64,
    exhausted: bool,
    job_spans: bool,
    stats: SupervisorStats,
    metrics: StageMetrics,
}

impl<S: Source, T: Send + 'static> Supervisor<S, T> {
    /// Create a supervisor over `source` with default configuration.
    pub fn new(source: S) -> Self {
        Self::build(source, Arc::from("supervisor"), &StageConfig::default())
    }

    /// Create a supervisor with a custom configuration.
    pub fn with_config(source: S, config: StageConfig) -> Result<Self> {
        config.validate()?;
        let stage = Arc::from(config.name_or("supervisor"));
        Ok(Self::build(source, stage, &config))
    }

    pub(crate) fn build(source: S, stage: Arc<str>, config: &StageConfig) -> Self {
        let core = Core {
            metrics: StageMetrics::new(&stage),
            stage,
            upstream: Sequential::new(source),
            jobs: VecDeque::new(),
            tickets: VecDeque::new(),
            next_id: 0,
            exhausted: false,
            job_spans: config.job_spans,
            stats: SupervisorStats::default(),
        };
        Self {
            core: Arc::new(Mutex::new(core)),
            cancel: config.stage_token(),
            cancel_on_drop: config.cancel_on_drop,
        }
    }

    /// Request the next result, issuing one upstream pull processed by `op`.
    ///
    /// The returned ticket resolves after every earlier ticket, with the
    /// result of the next job (in issuance order) that did not skip.
    pub fn submit<O>(&self, op: Arc<O>) -> Ticket<T>
    where
        O: Operation<S::Item, Output = T>,
    {
        let (ticket, resolver) = Ticket::channel();
        let mut core = self.core.lock().unwrap();
        core.tickets.push_back(resolver);
        issue_job(&self.core, &mut core, op, &self.cancel);
        ticket
    }

    /// Current bookkeeping counters.
    pub fn stats(&self) -> SupervisorStats {
        self.core.lock().unwrap().stats
    }

    /// Whether exhaustion (or cancellation) has been observed.
    pub fn is_exhausted(&self) -> bool {
        self.core.lock().unwrap().exhausted
    }

    /// Cancel all in-flight jobs.
    ///
    /// In-flight slots resolve to [`Error::Cancelled`] in order; later
    /// requests report exhaustion without pulling.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            trace_cancelled(&self.core.lock().unwrap().stage);
            self.cancel.cancel();
        }
    }

    /// The token this supervisor's jobs are raced against.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl<S: Source, T> Drop for Supervisor<S, T> {
    fn drop(&mut self) {
        if self.cancel_on_drop {
            self.cancel.cancel();
        }
    }
}

/// Append a job to the queue and start its work.
fn issue_job<S, O>(
    shared: &Arc<Mutex<Core<S, O::Output>>>,
    core: &mut Core<S, O::Output>,
    op: Arc<O>,
    cancel: &CancellationToken,
) where
    S: Source,
    O: Operation<S::Item>,
{
    let id = JobId(core.next_id);
    core.next_id += 1;

    if !core.exhausted && cancel.is_cancelled() {
        core.exhausted = true;
    }
    if core.exhausted {
        tracing::trace!(stage = %core.stage, job = id.0, "job issued after exhaustion");
        core.jobs.push_back(Job::exhausted(id));
        core.drain();
        return;
    }

    let index = core.upstream.issued();
    let pulled = panic::catch_unwind(AssertUnwindSafe(|| core.upstream.pull()));
    core.jobs.push_back(Job::pending(id));
    core.stats.issued += 1;
    core.stats.in_flight += 1;
    core.metrics.record_issued();
    tracing::trace!(stage = %core.stage, job = id.0, index, "job issued");

    let pull = match pulled {
        Ok((_, pull)) => pull,
        Err(payload) => {
            let err = Error::panicked(&core.stage, index, payload);
            trace_failure(&core.stage, id.0, &err);
            core.settle(id, Settled::Ready(Err(err)));
            return;
        }
    };

    let handle = JobHandle::new(id, index);
    let stage = Arc::clone(&core.stage);
    let work = run_job(Arc::clone(shared), stage, op, handle, pull, cancel.clone());
    if core.job_spans {
        tokio::spawn(work.instrument(span_job(&core.stage, id.0, index)));
    } else {
        tokio::spawn(work);
    }
}

/// Await one job's pull and operation, then settle it.
///
/// The job settles even when the pull or the operation panics.
async fn run_job<S, O>(
    shared: Arc<Mutex<Core<S, O::Output>>>,
    stage: Arc<str>,
    op: Arc<O>,
    job: JobHandle,
    pull: PullFuture<S::Item>,
    cancel: CancellationToken,
) where
    S: Source,
    O: Operation<S::Item>,
{
    let work = async {
        match pull.await? {
            Some(item) => op.run(item, job).await.map(Some),
            None => Ok(None),
        }
    };
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        caught = AssertUnwindSafe(work).catch_unwind() => caught
            .unwrap_or_else(|payload| Err(Error::panicked(&stage, job.index(), payload))),
    };

    let mut core = shared.lock().unwrap();
    let settled = match outcome {
        Ok(Some(Verdict::Deliver(value))) => Settled::Ready(Ok(Some(value))),
        Ok(Some(Verdict::Skip)) => {
            tracing::trace!(stage = %core.stage, job = job.id().0, index = job.index(), "job skipped");
            issue_job(&shared, &mut core, op, &cancel);
            Settled::Skipped
        }
        Ok(None) => {
            if !core.exhausted {
                core.exhausted = true;
                trace_exhausted(&core.stage, core.upstream.issued());
            }
            Settled::Ready(Ok(None))
        }
        Err(err) => {
            if err.is_cancelled() {
                core.exhausted = true;
            }
            trace_failure(&core.stage, job.id().0, &err);
            Settled::Ready(Err(err))
        }
    };
    core.settle(job.id(), settled);
}

impl<S, T> Core<S, T> {
    /// Record how a job settled and deliver whatever is now in order.
    fn settle(&mut self, id: JobId, settled: Settled<T>) {
        let error = match &settled {
            Settled::Ready(Err(err)) => Some(err),
            _ => None,
        };
        tracing::trace!(stage = %self.stage, job = id.0, failed = error.is_some(), "job settled");
        self.stats.in_flight = self.stats.in_flight.saturating_sub(1);
        match error {
            Some(err) if err.is_cancelled() => self.stats.cancelled += 1,
            Some(_) => self.stats.failed += 1,
            None => {}
        }
        if let Settled::Skipped = settled {
            self.stats.skipped += 1;
            self.metrics.record_skipped();
        }
        self.metrics.record_settled(error);

        let slot = self
            .jobs
            .front()
            .and_then(|head| id.0.checked_sub(head.id.0))
            .and_then(|offset| self.jobs.get_mut(offset as usize));
        match slot {
            Some(job) => job.settled = Some(settled),
            None => {
                tracing::warn!(stage = %self.stage, job = id.0, "settled job is not queued");
                return;
            }
        }
        self.drain();
    }

    /// Pop settled jobs from the head of the queue, resolving tickets in order.
    fn drain(&mut self) {
        while self.jobs.front().is_some_and(Job::is_settled) {
            let Some(Job {
                id,
                settled: Some(settled),
            }) = self.jobs.pop_front()
            else {
                break;
            };

            match settled {
                Settled::Skipped => {
                    tracing::trace!(stage = %self.stage, job = id.0, "skipped job discarded");
                }
                Settled::Ready(result) => match self.tickets.pop_front() {
                    Some(ticket) => {
                        self.stats.delivered += 1;
                        self.metrics.record_delivered();
                        if !ticket.resolve(result) {
                            tracing::trace!(stage = %self.stage, job = id.0, "ticket dropped before delivery");
                        }
                    }
                    None => {
                        tracing::warn!(stage = %self.stage, job = id.0, "settled job has no waiting ticket");
                    }
                },
            }
        }
    }
}
