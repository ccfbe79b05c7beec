//! Asynchronous combinators: transform, select, aggregate and enumerate.
//!
//! Every combinator takes ownership of its upstream [`Source`] and is itself
//! a `Source`, so stages chain without special cases:
//!
//! ```rust,ignore
//! let total = aggregate(
//!     |acc, len, _| Deferred::ok(acc + len),
//!     0usize,
//!     transform(fetch_len, select(is_interesting, from_iter(urls))),
//!     0,
//! );
//! ```
//!
//! [`Transform`] and [`Select`] are built on the
//! [`Supervisor`](crate::supervisor::Supervisor) reorder buffer;
//! [`Aggregate`] chains its folds through a
//! [`Pipeliner`](crate::pipeliner::Pipeliner). [`Enumerate`] only tags
//! positions and adds no pipelining of its own.

mod aggregate;
mod enumerate;
mod select;
mod transform;

pub use aggregate::Aggregate;
pub use enumerate::Enumerate;
pub use select::Select;
pub use transform::Transform;

use crate::deferred::Deferred;
use crate::error::Fallible;
use crate::source::Source;

// ============================================================================
// Constructor Functions
// ============================================================================

/// Apply `f` to every item of `source`.
pub fn transform<S, F, U>(f: F, source: S) -> Transform<S, F, U>
where
    S: Source,
    F: Fn(S::Item) -> Deferred<Fallible<U>> + Send + Sync + 'static,
    U: Send + 'static,
{
    Transform::new(source, f)
}

/// Keep the items of `source` accepted by `predicate`.
pub fn select<S, P>(predicate: P, source: S) -> Select<S, P>
where
    S: Source,
    P: Fn(&S::Item) -> Deferred<Fallible<bool>> + Send + Sync + 'static,
{
    Select::new(source, predicate)
}

/// Fold `source` with `f`, over the whole sequence (`window == 0`) or in
/// independent windows of `window` items.
pub fn aggregate<S, F, A>(f: F, initial: A, source: S, window: usize) -> Aggregate<S, F, A>
where
    S: Source,
    F: Fn(A, S::Item, u64) -> Deferred<Fallible<A>> + Send + Sync + 'static,
    A: Clone + Send + 'static,
{
    Aggregate::new(source, f, initial, window)
}

/// Pair every item of `source` with its position, counted from `start`.
pub fn enumerate<S: Source>(start: u64, source: S) -> Enumerate<S> {
    Enumerate::new(source, start)
}
