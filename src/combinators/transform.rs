//! Pipelined, order-preserving map.

use std::sync::Arc;

use crate::config::StageConfig;
use crate::deferred::Deferred;
use crate::error::{Error, Fallible, Result};
use crate::source::{Pull, Source};
use crate::supervisor::{JobHandle, Operation, Supervisor, SupervisorStats, Verdict};

/// Applies a function to every item of its upstream.
///
/// Each pull issues one upstream pull and starts `f` on the item as soon as
/// it arrives, without waiting for earlier items. Results are delivered in
/// pull order. A failing call fails only its own slot.
///
/// # Example
///
/// ```rust,ignore
/// let lengths = from_iter(urls).transform(|url: String| {
///     Deferred::pending(async move { Ok(fetch(&url).await?.len()) })
/// });
/// ```
pub struct Transform<S: Source, F, U> {
    supervisor: Supervisor<S, U>,
    op: Arc<MapFn<F>>,
}

struct MapFn<F> {
    f: F,
    stage: Arc<str>,
}

impl<T, U, F> Operation<T> for MapFn<F>
where
    F: Fn(T) -> Deferred<Fallible<U>> + Send + Sync + 'static,
    U: Send + 'static,
{
    type Output = U;

    fn run(&self, item: T, job: JobHandle) -> Deferred<Result<Verdict<U>>> {
        let stage = Arc::clone(&self.stage);
        let index = job.index();
        (self.f)(item).map(move |result| {
            result
                .map(Verdict::Deliver)
                .map_err(|e| Error::function(&*stage, index, e))
        })
    }
}

impl<S, F, U> Transform<S, F, U>
where
    S: Source,
    F: Fn(S::Item) -> Deferred<Fallible<U>> + Send + Sync + 'static,
    U: Send + 'static,
{
    /// Wrap `source`, taking ownership of it.
    pub fn new(source: S, f: F) -> Self {
        Self::build(source, f, &StageConfig::default())
    }

    /// Wrap `source` with a custom configuration.
    pub fn with_config(source: S, f: F, config: StageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(source, f, &config))
    }

    fn build(source: S, f: F, config: &StageConfig) -> Self {
        let stage: Arc<str> = Arc::from(config.name_or("transform"));
        tracing::debug!(stage = %stage, upstream = source.name(), "transform stage created");
        Self {
            supervisor: Supervisor::build(source, Arc::clone(&stage), config),
            op: Arc::new(MapFn { f, stage }),
        }
    }

    /// Cancel all in-flight calls.
    pub fn cancel(&self) {
        self.supervisor.cancel();
    }

    /// Bookkeeping counters of the underlying supervisor.
    pub fn stats(&self) -> SupervisorStats {
        self.supervisor.stats()
    }
}

impl<S, F, U> Source for Transform<S, F, U>
where
    S: Source,
    F: Fn(S::Item) -> Deferred<Fallible<U>> + Send + Sync + 'static,
    U: Send + 'static,
{
    type Item = U;

    fn pull(&mut self) -> Pull<U> {
        Deferred::pending(self.supervisor.submit(Arc::clone(&self.op)))
    }

    fn name(&self) -> &str {
        &self.op.stage
    }
}
