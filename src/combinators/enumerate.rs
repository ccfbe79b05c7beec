//! Position tagging.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::deferred::Deferred;
use crate::sequential::Sequential;
use crate::source::{Pull, Source};

/// Pairs every item of its upstream with its position, counted from `start`.
///
/// Positions follow pull order: a pull that fails still uses up its
/// position. Once a pull reports exhaustion the upstream is no longer
/// pulled and every later pull reports exhaustion.
///
/// # Example
///
/// ```rust,ignore
/// let numbered = from_iter(["a", "b", "c"]).enumerate(1);
/// assert_eq!(numbered.collect().await?, vec![(1, "a"), (2, "b"), (3, "c")]);
/// ```
pub struct Enumerate<S> {
    upstream: Sequential<S>,
    start: u64,
    exhausted: Arc<AtomicBool>,
}

impl<S: Source> Enumerate<S> {
    /// Wrap `source`, numbering its items from `start`.
    pub fn new(source: S, start: u64) -> Self {
        Self {
            upstream: Sequential::new(source),
            start,
            exhausted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether exhaustion has been observed.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }
}

impl<S: Source> Source for Enumerate<S> {
    type Item = (u64, S::Item);

    fn pull(&mut self) -> Pull<Self::Item> {
        if self.is_exhausted() {
            return Deferred::ok(None);
        }

        let (index, pull) = self.upstream.pull_deferred();
        let position = self.start + index;
        let exhausted = Arc::clone(&self.exhausted);
        pull.map(move |pulled| match pulled {
            Ok(Some(item)) => Ok(Some((position, item))),
            Ok(None) => {
                if !exhausted.swap(true, Ordering::AcqRel) {
                    tracing::trace!(issued = index, "enumerate exhausted");
                }
                Ok(None)
            }
            Err(err) => Err(err),
        })
    }

    fn name(&self) -> &str {
        "enumerate"
    }
}
