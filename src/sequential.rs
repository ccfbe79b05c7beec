//! Sequential pull adapter.
//!
//! Wraps any [`Source`] and turns each pull into an owned, `'static` future
//! tagged with its position in the sequence. Combinators hold their upstream
//! through this adapter so that every pull they issue is numbered in issuance
//! order.

use std::future::IntoFuture;

use crate::deferred::DeferredFuture;
use crate::error::Result;
use crate::source::{Pull, Source};

/// Future resolving one upstream pull.
pub type PullFuture<T> = DeferredFuture<Result<Option<T>>>;

/// Uniform asynchronous pull over a [`Source`].
pub struct Sequential<S> {
    source: S,
    issued: u64,
}

impl<S: Source> Sequential<S> {
    /// Take ownership of `source`.
    pub fn new(source: S) -> Self {
        Self { source, issued: 0 }
    }

    /// Issue the next pull, returning its upstream index and its future.
    ///
    /// The pull is issued on the source before this returns, even if the
    /// future is never awaited.
    pub fn pull(&mut self) -> (u64, PullFuture<S::Item>) {
        let (index, pull) = self.pull_deferred();
        (index, pull.into_future())
    }

    /// Issue the next pull, keeping the source's immediate results immediate.
    pub fn pull_deferred(&mut self) -> (u64, Pull<S::Item>) {
        let index = self.issued;
        self.issued += 1;
        (index, self.source.pull())
    }

    /// Number of pulls issued so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Name of the wrapped source.
    pub fn name(&self) -> &str {
        self.source.name()
    }
}
