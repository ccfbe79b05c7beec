//! Ordered pipeliner.
//!
//! Each issued work unit starts running immediately in its own task, but
//! its result is only delivered once the previously issued unit has been
//! delivered. The pipeliner keeps the settle signal of the last issued
//! unit and chains every new unit behind it, so work overlaps while
//! delivery stays serial.
//!
//! Once a unit reports exhaustion, every later unit reports exhaustion
//! too, and callers can check [`Pipeliner::is_exhausted`] to stop issuing
//! new upstream pulls.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::{self, BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::StageConfig;
use crate::error::{Error, Result};
use crate::observability::{StageMetrics, trace_cancelled, trace_exhausted, trace_failure};
use crate::supervisor::Ticket;

/// Resolves once a unit's ticket has been resolved.
type SettledSignal = Shared<BoxFuture<'static, ()>>;

/// Chains work units so their results are delivered in issuance order.
pub struct Pipeliner<T> {
    stage: Arc<str>,
    last: Option<SettledSignal>,
    terminal: Arc<AtomicBool>,
    cancel: CancellationToken,
    cancel_on_drop: bool,
    issued: u64,
    metrics: StageMetrics,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Pipeliner<T> {
    /// Create a pipeliner with its own cancellation token.
    pub fn new(stage: impl Into<Arc<str>>) -> Self {
        Self::build(stage.into(), &StageConfig::default())
    }

    pub(crate) fn build(stage: Arc<str>, config: &StageConfig) -> Self {
        Self {
            metrics: StageMetrics::new(&stage),
            stage,
            last: None,
            terminal: Arc::new(AtomicBool::new(false)),
            cancel: config.stage_token(),
            cancel_on_drop: config.cancel_on_drop,
            issued: 0,
            _marker: std::marker::PhantomData,
        }
    }

    /// Start `work` now and get a ticket for its result.
    ///
    /// The ticket resolves after every previously issued ticket. If the
    /// sequence is already exhausted `work` is dropped without being run.
    pub fn issue<F>(&mut self, work: F) -> Ticket<T>
    where
        F: Future<Output = Result<Option<T>>> + Send + 'static,
    {
        if self.is_exhausted() {
            return self.issue_exhausted();
        }

        self.metrics.record_issued();
        tracing::trace!(stage = %self.stage, slot = self.issued, "work issued");

        let handle = tokio::spawn(work);
        let abort = handle.abort_handle();
        let cancel = self.cancel.clone();
        let metrics = self.metrics.clone();
        let outcome = async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    abort.abort();
                    Err(Error::Cancelled)
                }
                joined = handle => joined.map_err(Error::from).and_then(|result| result),
            };
            metrics.record_settled(result.as_ref().err());
            result
        };
        self.chain(outcome)
    }

    /// Get a ticket reporting exhaustion, delivered in order.
    pub fn issue_exhausted(&mut self) -> Ticket<T> {
        self.chain(future::ready(Ok(None)))
    }

    /// Whether exhaustion or cancellation has been observed.
    pub fn is_exhausted(&self) -> bool {
        self.terminal.load(Ordering::Acquire) || self.cancel.is_cancelled()
    }

    /// Cancel all work in flight.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            trace_cancelled(&self.stage);
            self.cancel.cancel();
        }
    }

    /// Number of tickets handed out.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Metric handles of this stage.
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    fn chain<F>(&mut self, outcome: F) -> Ticket<T>
    where
        F: Future<Output = Result<Option<T>>> + Send + 'static,
    {
        let (ticket, resolver) = Ticket::channel();
        let (settled_tx, settled_rx) = oneshot::channel::<()>();
        let settled: SettledSignal = settled_rx.map(|_| ()).boxed().shared();
        let previous = self.last.replace(settled);

        let slot = self.issued;
        self.issued += 1;
        let stage = Arc::clone(&self.stage);
        let terminal = Arc::clone(&self.terminal);
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let previous = async move {
                if let Some(previous) = previous {
                    previous.await;
                }
            };
            let (result, ()) = future::join(outcome, previous).await;

            // The previous slot has been delivered, so its terminal flag is visible.
            let result = match result {
                Err(Error::Cancelled) => Err(Error::Cancelled),
                _ if terminal.load(Ordering::Acquire) => Ok(None),
                other => other,
            };
            match &result {
                Ok(None) => {
                    if !terminal.swap(true, Ordering::AcqRel) {
                        trace_exhausted(&stage, slot);
                    }
                }
                Err(err) => trace_failure(&stage, slot, err),
                Ok(Some(_)) => {}
            }

            metrics.record_delivered();
            if !resolver.resolve(result) {
                tracing::trace!(stage = %stage, slot, "ticket dropped before delivery");
            }
            // A closed receiver means no later slot was chained.
            let _ = settled_tx.send(());
        });
        ticket
    }
}

impl<T> Drop for Pipeliner<T> {
    fn drop(&mut self) {
        if self.cancel_on_drop {
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    async fn after(ms: u64, value: Option<u32>) -> Result<Option<u32>> {
        sleep(Duration::from_millis(ms)).await;
        Ok(value)
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_follows_issuance() {
        let mut pipeliner = Pipeliner::new("test");
        let start = tokio::time::Instant::now();
        let first = pipeliner.issue(after(30, Some(1)));
        let second = pipeliner.issue(after(10, Some(2)));
        let third = pipeliner.issue(after(20, Some(3)));

        // The fastest unit still waits for the slowest one issued before it.
        assert_eq!(second.await.unwrap(), Some(2));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(third.await.unwrap(), Some(3));
        assert_eq!(first.await.unwrap(), Some(1));
        assert_eq!(pipeliner.issued(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_overlaps() {
        let mut pipeliner = Pipeliner::new("test");
        let start = tokio::time::Instant::now();
        let tickets: Vec<_> = (0..4).map(|i| pipeliner.issue(after(100, Some(i)))).collect();

        for (i, ticket) in tickets.into_iter().enumerate() {
            assert_eq!(ticket.await.unwrap(), Some(i as u32));
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_sticky() {
        let mut pipeliner = Pipeliner::new("test");
        let first = pipeliner.issue(after(10, None));
        // Slower, and would produce a value, but comes after the end.
        let second = pipeliner.issue(after(50, Some(9)));

        assert_eq!(first.await.unwrap(), None);
        assert!(pipeliner.is_exhausted());
        assert_eq!(second.await.unwrap(), None);
        assert_eq!(pipeliner.issue(after(0, Some(1))).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failure_is_local() {
        let mut pipeliner = Pipeliner::new("test");
        let first = pipeliner.issue(async { Err(Error::Config("boom".into())) });
        let second = pipeliner.issue(after(0, Some(2)));

        assert!(first.await.is_err());
        assert_eq!(second.await.unwrap(), Some(2));
        assert!(!pipeliner.is_exhausted());
    }

    #[tokio::test]
    async fn test_panicking_work_is_a_task_error() {
        let mut pipeliner = Pipeliner::<u32>::new("test");
        let ticket = pipeliner.issue(async { panic!("work exploded") });
        assert!(matches!(ticket.await, Err(Error::Task(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let mut pipeliner = Pipeliner::new("test");
        let ticket = pipeliner.issue(after(1_000, Some(1)));
        pipeliner.cancel();

        assert!(matches!(ticket.await, Err(Error::Cancelled)));
        assert!(pipeliner.is_exhausted());
        assert_eq!(pipeliner.issue(after(0, Some(2))).await.unwrap(), None);
    }
}
