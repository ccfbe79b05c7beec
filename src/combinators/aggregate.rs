//! Folding over a whole sequence or over fixed-size windows.

use std::sync::Arc;

use futures::future;
use tracing::Instrument;

use crate::config::StageConfig;
use crate::deferred::Deferred;
use crate::error::{Error, Fallible, Result};
use crate::observability::{StageMetrics, span_stage, trace_exhausted};
use crate::pipeliner::Pipeliner;
use crate::sequential::{PullFuture, Sequential};
use crate::source::{Pull, Source};

/// Folds its upstream with a reducer `f(accumulator, item, index)`.
///
/// With `window == 0` the first pull folds the entire upstream, one item at
/// a time, and yields the final accumulator; every later pull reports
/// exhaustion. A failure during the fold fails that single result.
///
/// With `window == n > 0` every pull issues `n` upstream pulls at once and
/// folds the batch in pull order, starting from `initial` each time. A
/// partial last batch yields its own result; an empty batch means the
/// upstream is exhausted.
///
/// # Example
///
/// ```rust,ignore
/// let sums = from_iter([1, 2, 3, 4, 5])
///     .aggregate_windowed(|acc: u32, v: u32, _| Deferred::ok(acc + v), 0, 2);
/// assert_eq!(sums.collect().await?, vec![3, 7, 5]);
/// ```
pub struct Aggregate<S: Source, F, A> {
    stage: Arc<str>,
    upstream: Option<Sequential<S>>,
    f: Arc<F>,
    initial: A,
    window: usize,
    pipeliner: Pipeliner<A>,
}

impl<S, F, A> Aggregate<S, F, A>
where
    S: Source,
    F: Fn(A, S::Item, u64) -> Deferred<Fallible<A>> + Send + Sync + 'static,
    A: Clone + Send + 'static,
{
    /// Wrap `source`; `window == 0` folds the whole sequence.
    pub fn new(source: S, f: F, initial: A, window: usize) -> Self {
        Self::build(source, f, initial, window, &StageConfig::default())
    }

    /// Wrap `source` with a custom configuration.
    pub fn with_config(
        source: S,
        f: F,
        initial: A,
        window: usize,
        config: StageConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(source, f, initial, window, &config))
    }

    fn build(source: S, f: F, initial: A, window: usize, config: &StageConfig) -> Self {
        let stage: Arc<str> = Arc::from(config.name_or("aggregate"));
        tracing::debug!(stage = %stage, upstream = source.name(), window, "aggregate stage created");
        Self {
            pipeliner: Pipeliner::build(Arc::clone(&stage), config),
            stage,
            upstream: Some(Sequential::new(source)),
            f: Arc::new(f),
            initial,
            window,
        }
    }

    /// Window size; `0` means the whole sequence.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Cancel the folds in flight.
    pub fn cancel(&self) {
        self.pipeliner.cancel();
    }

    fn pull_whole(&mut self) -> Pull<A> {
        let Some(upstream) = self.upstream.take() else {
            return Deferred::pending(self.pipeliner.issue_exhausted());
        };
        let span = span_stage(&self.stage, "aggregate");
        let fold = fold_all(
            upstream,
            Arc::clone(&self.f),
            self.initial.clone(),
            Arc::clone(&self.stage),
        );
        Deferred::pending(self.pipeliner.issue(fold.instrument(span)))
    }

    fn pull_window(&mut self) -> Pull<A> {
        if self.pipeliner.is_exhausted() {
            return Deferred::pending(self.pipeliner.issue_exhausted());
        }
        let Some(upstream) = self.upstream.as_mut() else {
            return Deferred::pending(self.pipeliner.issue_exhausted());
        };

        let pulls: Vec<_> = (0..self.window).map(|_| upstream.pull()).collect();
        let fold = fold_window(
            pulls,
            Arc::clone(&self.f),
            self.initial.clone(),
            Arc::clone(&self.stage),
            self.pipeliner.metrics().clone(),
        );
        Deferred::pending(self.pipeliner.issue(fold))
    }
}

/// Fold the whole upstream, strictly one pull at a time.
async fn fold_all<S, F, A>(
    mut upstream: Sequential<S>,
    f: Arc<F>,
    mut acc: A,
    stage: Arc<str>,
) -> Result<Option<A>>
where
    S: Source,
    F: Fn(A, S::Item, u64) -> Deferred<Fallible<A>>,
    A: Send + 'static,
{
    loop {
        let (index, pull) = upstream.pull();
        let Some(item) = pull.await? else {
            break;
        };
        acc = f(acc, item, index)
            .await
            .map_err(|e| Error::function(&*stage, index, e))?;
    }
    trace_exhausted(&stage, upstream.issued());
    Ok(Some(acc))
}

/// Fold one batch of already issued pulls, in pull order.
async fn fold_window<T, F, A>(
    pulls: Vec<(u64, PullFuture<T>)>,
    f: Arc<F>,
    mut acc: A,
    stage: Arc<str>,
    metrics: StageMetrics,
) -> Result<Option<A>>
where
    F: Fn(A, T, u64) -> Deferred<Fallible<A>>,
    A: Send + 'static,
{
    let (indices, pulls): (Vec<u64>, Vec<_>) = pulls.into_iter().unzip();
    let items = future::join_all(pulls).await;

    let mut folded = 0usize;
    for (index, item) in indices.into_iter().zip(items) {
        let Some(item) = item? else {
            break;
        };
        acc = f(acc, item, index)
            .await
            .map_err(|e| Error::function(&*stage, index, e))?;
        folded += 1;
    }

    if folded == 0 {
        return Ok(None);
    }
    tracing::trace!(stage = %stage, items = folded, "window folded");
    metrics.record_window();
    Ok(Some(acc))
}

impl<S, F, A> Source for Aggregate<S, F, A>
where
    S: Source,
    F: Fn(A, S::Item, u64) -> Deferred<Fallible<A>> + Send + Sync + 'static,
    A: Clone + Send + 'static,
{
    type Item = A;

    fn pull(&mut self) -> Pull<A> {
        if self.window == 0 {
            self.pull_whole()
        } else {
            self.pull_window()
        }
    }

    fn name(&self) -> &str {
        &self.stage
    }
}
