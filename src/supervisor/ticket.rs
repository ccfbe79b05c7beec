//! Tickets: one caller's pending request for the next result.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// A pending request for the next item of a sequence.
///
/// Tickets are handed out in request order and resolved in the same order.
/// Awaiting a ticket yields `Ok(Some(item))`, `Ok(None)` on exhaustion, or the
/// failure of the slot it was matched with. Dropping a ticket does not cancel
/// the work behind it.
#[must_use = "a ticket does nothing unless awaited"]
pub struct Ticket<T> {
    rx: oneshot::Receiver<Result<Option<T>>>,
}

/// The resolving half of a [`Ticket`].
pub(crate) struct Resolver<T> {
    tx: oneshot::Sender<Result<Option<T>>>,
}

impl<T> Ticket<T> {
    /// Create a waiting ticket and its resolver.
    pub(crate) fn channel() -> (Ticket<T>, Resolver<T>) {
        let (tx, rx) = oneshot::channel();
        (Ticket { rx }, Resolver { tx })
    }

    /// Create a ticket that is already resolved.
    pub fn resolved(result: Result<Option<T>>) -> Self {
        let (ticket, resolver) = Self::channel();
        resolver.resolve(result);
        ticket
    }
}

impl<T> Resolver<T> {
    /// Resolve the ticket. Returns `false` if the ticket was dropped.
    pub(crate) fn resolve(self, result: Result<Option<T>>) -> bool {
        self.tx.send(result).is_ok()
    }
}

impl<T> Future for Ticket<T> {
    type Output = Result<Option<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> std::fmt::Debug for Ticket<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket").finish_non_exhaustive()
    }
}
