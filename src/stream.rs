//! Consuming sources as [`futures::Stream`]s.

use std::collections::VecDeque;
use std::future::IntoFuture;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::FutureExt;
use futures::stream::{FusedStream, Stream};

use crate::error::Result;
use crate::sequential::PullFuture;
use crate::source::Source;

// ============================================================================
// One pull at a time
// ============================================================================

/// A stream that issues the next pull only after the previous one resolved.
///
/// Yields `Ok(item)` for every item and `Err(e)` for every failed slot;
/// ends at exhaustion.
pub struct PullStream<S: Source> {
    source: S,
    pending: Option<PullFuture<S::Item>>,
    done: bool,
}

impl<S: Source> PullStream<S> {
    /// Consume `source` as a stream.
    pub fn new(source: S) -> Self {
        Self {
            source,
            pending: None,
            done: false,
        }
    }
}

// The source is never pinned; pending pulls are boxed.
impl<S: Source> Unpin for PullStream<S> {}

impl<S: Source> Stream for PullStream<S> {
    type Item = Result<S::Item>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }

        let pending = this
            .pending
            .get_or_insert_with(|| this.source.pull().into_future());
        let result = ready!(pending.poll_unpin(cx));
        this.pending = None;

        match result {
            Ok(Some(item)) => Poll::Ready(Some(Ok(item))),
            Ok(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Err(e) => Poll::Ready(Some(Err(e))),
        }
    }
}

impl<S: Source> FusedStream for PullStream<S> {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

// ============================================================================
// Several pulls in flight
// ============================================================================

/// A stream that keeps up to `depth` pulls outstanding.
///
/// Useful in front of pipelined stages: with `depth` pulls in flight, up to
/// `depth` items are processed concurrently while the stream still yields
/// them in order. No new pulls are issued once exhaustion is observed.
pub struct BufferedPullStream<S: Source> {
    source: S,
    in_flight: VecDeque<PullFuture<S::Item>>,
    depth: usize,
    done: bool,
}

impl<S: Source> BufferedPullStream<S> {
    /// Consume `source` as a stream with `depth` outstanding pulls (at least one).
    pub fn new(source: S, depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            source,
            in_flight: VecDeque::with_capacity(depth),
            depth,
            done: false,
        }
    }

    /// Number of pulls currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl<S: Source> Unpin for BufferedPullStream<S> {}

impl<S: Source> Stream for BufferedPullStream<S> {
    type Item = Result<S::Item>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }

        while this.in_flight.len() < this.depth {
            this.in_flight.push_back(this.source.pull().into_future());
        }

        let Some(front) = this.in_flight.front_mut() else {
            return Poll::Ready(None);
        };
        let result = ready!(front.poll_unpin(cx));
        this.in_flight.pop_front();

        match result {
            Ok(Some(item)) => Poll::Ready(Some(Ok(item))),
            Ok(None) => {
                // Everything issued after the end resolves to exhaustion too.
                this.done = true;
                this.in_flight.clear();
                Poll::Ready(None)
            }
            Err(e) => Poll::Ready(Some(Err(e))),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done { (0, Some(0)) } else { (0, None) }
    }
}

impl<S: Source> FusedStream for BufferedPullStream<S> {
    fn is_terminated(&self) -> bool {
        self.done
    }
}
