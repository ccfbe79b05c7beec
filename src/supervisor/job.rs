//! Jobs: one upstream pull bound to the operation that processes it.

use crate::deferred::Deferred;
use crate::error::Result;

/// Identifier of a job, increasing in issuance order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Job({})", self.0)
    }
}

/// Opaque handle given to an [`Operation`] for the job it is running in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobHandle {
    id: JobId,
    index: u64,
}

impl JobHandle {
    pub(crate) fn new(id: JobId, index: u64) -> Self {
        Self { id, index }
    }

    /// The job's identifier.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Upstream position of the item this job pulled.
    pub fn index(&self) -> u64 {
        self.index
    }
}

/// What to do with a processed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<T> {
    /// Deliver this value to the next waiting ticket.
    Deliver(T),
    /// Discard the item; a replacement job is issued for the same ticket.
    Skip,
}

/// Per-item work run by a [`Supervisor`](super::Supervisor).
///
/// The operation receives the item produced by the job's upstream pull and
/// decides what the job delivers. Exhaustion and upstream failures never
/// reach the operation; the supervisor forwards them directly.
pub trait Operation<In>: Send + Sync + 'static {
    /// The type of value delivered to tickets.
    type Output: Send + 'static;

    /// Process one pulled item.
    fn run(&self, item: In, job: JobHandle) -> Deferred<Result<Verdict<Self::Output>>>;
}

/// How a job settled.
pub(crate) enum Settled<T> {
    /// A result for the next ticket.
    Ready(Result<Option<T>>),
    /// Nothing to deliver; the job is dropped without consuming a ticket.
    Skipped,
}

/// A job slot in the issuance-ordered queue.
pub(crate) struct Job<T> {
    pub(crate) id: JobId,
    /// `None` while the job's work is in flight.
    pub(crate) settled: Option<Settled<T>>,
}

impl<T> Job<T> {
    pub(crate) fn pending(id: JobId) -> Self {
        Self { id, settled: None }
    }

    pub(crate) fn exhausted(id: JobId) -> Self {
        Self {
            id,
            settled: Some(Settled::Ready(Ok(None))),
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.settled.is_some()
    }
}
