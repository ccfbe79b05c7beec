//! Pipelined, order-preserving filter.

use std::sync::Arc;

use crate::config::StageConfig;
use crate::deferred::Deferred;
use crate::error::{Error, Fallible, Result};
use crate::source::{Pull, Source};
use crate::supervisor::{JobHandle, Operation, Supervisor, SupervisorStats, Verdict};

/// Keeps the items of its upstream accepted by a predicate.
///
/// One pull may need several upstream items. Every outstanding pull keeps
/// one predicate evaluation in flight; a rejected item is replaced by a new
/// upstream pull the moment it is rejected, so the Kth accepted item always
/// goes to the Kth pull.
///
/// # Example
///
/// ```rust,ignore
/// let reachable = from_iter(hosts).select(|host: &String| {
///     let host = host.clone();
///     Deferred::pending(async move { Ok(ping(&host).await.is_ok()) })
/// });
/// ```
pub struct Select<S: Source, P> {
    supervisor: Supervisor<S, S::Item>,
    op: Arc<FilterFn<P>>,
}

struct FilterFn<P> {
    predicate: P,
    stage: Arc<str>,
}

impl<T, P> Operation<T> for FilterFn<P>
where
    P: Fn(&T) -> Deferred<Fallible<bool>> + Send + Sync + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn run(&self, item: T, job: JobHandle) -> Deferred<Result<Verdict<T>>> {
        let index = job.index();
        match (self.predicate)(&item) {
            Deferred::Immediate(accepted) => Deferred::ready(verdict(accepted, item, &self.stage, index)),
            Deferred::Pending(accepted) => {
                let stage = Arc::clone(&self.stage);
                Deferred::pending(async move { verdict(accepted.await, item, &stage, index) })
            }
        }
    }
}

fn verdict<T>(accepted: Fallible<bool>, item: T, stage: &str, index: u64) -> Result<Verdict<T>> {
    match accepted {
        Ok(true) => Ok(Verdict::Deliver(item)),
        Ok(false) => Ok(Verdict::Skip),
        Err(e) => Err(Error::function(stage, index, e)),
    }
}

impl<S, P> Select<S, P>
where
    S: Source,
    P: Fn(&S::Item) -> Deferred<Fallible<bool>> + Send + Sync + 'static,
{
    /// Wrap `source`, taking ownership of it.
    pub fn new(source: S, predicate: P) -> Self {
        Self::build(source, predicate, &StageConfig::default())
    }

    /// Wrap `source` with a custom configuration.
    pub fn with_config(source: S, predicate: P, config: StageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(source, predicate, &config))
    }

    fn build(source: S, predicate: P, config: &StageConfig) -> Self {
        let stage: Arc<str> = Arc::from(config.name_or("select"));
        tracing::debug!(stage = %stage, upstream = source.name(), "select stage created");
        Self {
            supervisor: Supervisor::build(source, Arc::clone(&stage), config),
            op: Arc::new(FilterFn { predicate, stage }),
        }
    }

    /// Cancel all in-flight evaluations.
    pub fn cancel(&self) {
        self.supervisor.cancel();
    }

    /// Bookkeeping counters of the underlying supervisor.
    pub fn stats(&self) -> SupervisorStats {
        self.supervisor.stats()
    }
}

impl<S, P> Source for Select<S, P>
where
    S: Source,
    P: Fn(&S::Item) -> Deferred<Fallible<bool>> + Send + Sync + 'static,
{
    type Item = S::Item;

    fn pull(&mut self) -> Pull<S::Item> {
        Deferred::pending(self.supervisor.submit(Arc::clone(&self.op)))
    }

    fn name(&self) -> &str {
        &self.op.stage
    }
}
