//! The uniform pull interface and adapters for common origins.
//!
//! Everything in iterly speaks one contract: [`Source::pull`] issues the next
//! pull immediately and hands back a [`Pull`] that resolves to `Ok(Some(item))`,
//! `Ok(None)` once the sequence is exhausted, or an error. Combinators consume
//! a `Source` and are themselves a `Source`, so they chain freely.
//!
//! # Example
//!
//! ```rust,ignore
//! use iterly::prelude::*;
//!
//! let doubled_evens = from_iter(1..=10u32)
//!     .select(|v: &u32| Deferred::ok(v % 2 == 0))
//!     .transform(|v: u32| Deferred::ok(v * 2));
//!
//! assert_eq!(doubled_evens.collect().await?, vec![4, 8, 12, 16, 20]);
//! ```

mod origin;

pub use origin::*;

use std::future::Future;

use futures::TryStreamExt;

use crate::combinators::{Aggregate, Enumerate, Select, Transform};
use crate::deferred::Deferred;
use crate::error::{Fallible, Result};
use crate::stream::{BufferedPullStream, PullStream};

/// Deferred result of one pull: an item, exhaustion (`None`) or a failure.
pub type Pull<T> = Deferred<Result<Option<T>>>;

/// A pull-based sequence.
///
/// Each call to [`pull`](Source::pull) advances the sequence irreversibly;
/// pulls are issued in call order even when their results settle out of
/// order. Once a pull reports exhaustion, every later pull must report
/// exhaustion too.
///
/// A source is owned by exactly one consumer. Wrapping it in a combinator
/// moves it; polling one source from two independent stages is not
/// supported.
pub trait Source: Send + 'static {
    /// The type of items this source produces.
    type Item: Send + 'static;

    /// Issue the next pull.
    fn pull(&mut self) -> Pull<Self::Item>;

    /// Get the name of this source (for debugging/logging).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    type Item = S::Item;

    fn pull(&mut self) -> Pull<Self::Item> {
        (**self).pull()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Combinator and consumer methods available on every [`Source`].
pub trait SourceExt: Source + Sized {
    /// Apply `f` to every item, pipelined and order-preserving.
    fn transform<F, U>(self, f: F) -> Transform<Self, F, U>
    where
        F: Fn(Self::Item) -> Deferred<Fallible<U>> + Send + Sync + 'static,
        U: Send + 'static,
    {
        Transform::new(self, f)
    }

    /// Keep only the items accepted by `predicate`, pipelined and order-preserving.
    fn select<P>(self, predicate: P) -> Select<Self, P>
    where
        P: Fn(&Self::Item) -> Deferred<Fallible<bool>> + Send + Sync + 'static,
    {
        Select::new(self, predicate)
    }

    /// Fold the whole sequence into a single accumulated value.
    fn aggregate<F, A>(self, f: F, initial: A) -> Aggregate<Self, F, A>
    where
        F: Fn(A, Self::Item, u64) -> Deferred<Fallible<A>> + Send + Sync + 'static,
        A: Clone + Send + 'static,
    {
        Aggregate::new(self, f, initial, 0)
    }

    /// Fold independent windows of `window` items, yielding one value per window.
    fn aggregate_windowed<F, A>(self, f: F, initial: A, window: usize) -> Aggregate<Self, F, A>
    where
        F: Fn(A, Self::Item, u64) -> Deferred<Fallible<A>> + Send + Sync + 'static,
        A: Clone + Send + 'static,
    {
        Aggregate::new(self, f, initial, window)
    }

    /// Pair every item with its position, counted from `start`.
    fn enumerate(self, start: u64) -> Enumerate<Self> {
        Enumerate::new(self, start)
    }

    /// Consume the source as a stream, one pull at a time.
    fn into_stream(self) -> PullStream<Self> {
        PullStream::new(self)
    }

    /// Consume the source as a stream that keeps `depth` pulls outstanding.
    fn into_buffered_stream(self, depth: usize) -> BufferedPullStream<Self> {
        BufferedPullStream::new(self, depth)
    }

    /// Pull to exhaustion, stopping at the first failure.
    fn collect(self) -> impl Future<Output = Result<Vec<Self::Item>>> + Send {
        self.into_stream().try_collect()
    }
}

impl<S: Source> SourceExt for S {}
