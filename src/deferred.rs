//! Values that are either available now or later.
//!
//! Sources and user functions return a [`Deferred`] so that synchronous and
//! asynchronous results share one type. The variant is decided once, at the
//! point where the value is produced, and resolved uniformly by awaiting.

use std::future::{Future, IntoFuture};

use futures::future::{self, BoxFuture, Either, FutureExt};

use crate::error::Fallible;

/// Future returned when awaiting a [`Deferred`].
pub type DeferredFuture<T> = Either<future::Ready<T>, BoxFuture<'static, T>>;

/// A result that is either immediately available or still pending.
///
/// # Example
///
/// ```rust,ignore
/// let now: Deferred<u32> = Deferred::Immediate(1);
/// let later = Deferred::pending(async { 2 });
/// assert_eq!(now.await + later.await, 3);
/// ```
pub enum Deferred<T> {
    /// The value is ready.
    Immediate(T),
    /// The value will be produced by a future.
    Pending(BoxFuture<'static, T>),
}

impl<T> Deferred<T> {
    /// Create an immediately available value.
    #[inline]
    pub fn ready(value: T) -> Self {
        Self::Immediate(value)
    }

    /// Create a deferred value from a future.
    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::Pending(fut.boxed())
    }

    /// Check if the value is available without awaiting.
    #[inline]
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Immediate(_))
    }

    /// Take the value if it is immediately available.
    pub fn into_immediate(self) -> Option<T> {
        match self {
            Self::Immediate(value) => Some(value),
            Self::Pending(_) => None,
        }
    }

    /// Transform the eventual value, keeping it immediate when it already is.
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        F: FnOnce(T) -> U + Send + 'static,
        T: 'static,
    {
        match self {
            Self::Immediate(value) => Deferred::Immediate(f(value)),
            Self::Pending(fut) => Deferred::Pending(fut.map(f).boxed()),
        }
    }
}

impl<T, E> Deferred<Result<T, E>> {
    /// Create an immediately available success.
    #[inline]
    pub fn ok(value: T) -> Self {
        Self::Immediate(Ok(value))
    }

    /// Create an immediately available failure.
    #[inline]
    pub fn err(err: E) -> Self {
        Self::Immediate(Err(err))
    }
}

impl<T: 'static> Deferred<Fallible<T>> {
    /// Create a deferred success from a future that cannot fail.
    pub fn resolve_with<F>(fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::Pending(fut.map(Ok).boxed())
    }
}

impl<T: Send + 'static> IntoFuture for Deferred<T> {
    type Output = T;
    type IntoFuture = DeferredFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Immediate(value) => Either::Left(future::ready(value)),
            Self::Pending(fut) => Either::Right(fut),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_immediate_resolves() {
        let d = Deferred::ready(7u32);
        assert!(d.is_immediate());
        assert_eq!(d.await, 7);
    }

    #[tokio::test]
    async fn test_pending_resolves() {
        let d = Deferred::pending(async { 7u32 });
        assert!(!d.is_immediate());
        assert_eq!(d.await, 7);
    }

    #[tokio::test]
    async fn test_map_keeps_variant() {
        let now = Deferred::ready(2u32).map(|v| v * 10);
        assert_eq!(now.into_immediate(), Some(20));

        let later = Deferred::pending(async { 2u32 }).map(|v| v * 10);
        assert!(!later.is_immediate());
        assert_eq!(later.await, 20);
    }

    #[tokio::test]
    async fn test_result_helpers() {
        let ok: Deferred<Fallible<u32>> = Deferred::ok(1);
        assert_eq!(ok.await.unwrap(), 1);

        let err: Deferred<Fallible<u32>> = Deferred::err("nope".into());
        assert_eq!(err.await.unwrap_err().to_string(), "nope");

        let later: Deferred<Fallible<u32>> = Deferred::resolve_with(async { 3 });
        assert_eq!(later.await.unwrap(), 3);
    }
}
