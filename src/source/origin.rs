//! Sources built from iterators, generator functions and streams.

use std::future::Future;
use std::iter::Fuse;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};

use super::{Pull, Source};
use crate::deferred::Deferred;
use crate::error::{BoxError, Error, Result};

// ============================================================================
// Iterator Source
// ============================================================================

/// A source that produces items from a synchronous iterator.
pub struct IterSource<I: Iterator> {
    iter: Fuse<I>,
}

impl<I: Iterator> IterSource<I> {
    /// Create a new iterator source.
    pub fn new(iter: I) -> Self {
        Self { iter: iter.fuse() }
    }
}

impl<I> Source for IterSource<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    type Item = I::Item;

    fn pull(&mut self) -> Pull<I::Item> {
        Deferred::ready(Ok(self.iter.next()))
    }

    fn name(&self) -> &str {
        "iter_source"
    }
}

/// Create a source from anything iterable.
pub fn from_iter<I>(iter: I) -> IterSource<I::IntoIter>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    IterSource::new(iter.into_iter())
}

// ============================================================================
// Generator Function Sources
// ============================================================================

/// A source that calls a function until it returns a sentinel value.
pub struct FnSource<F, T> {
    f: F,
    sentinel: T,
    calls: usize,
    done: bool,
}

impl<F, T> Source for FnSource<F, T>
where
    F: FnMut(usize) -> T + Send + 'static,
    T: PartialEq + Send + 'static,
{
    type Item = T;

    fn pull(&mut self) -> Pull<T> {
        if self.done {
            return Deferred::ready(Ok(None));
        }

        let value = (self.f)(self.calls);
        self.calls += 1;
        if value == self.sentinel {
            self.done = true;
            return Deferred::ready(Ok(None));
        }
        Deferred::ready(Ok(Some(value)))
    }

    fn name(&self) -> &str {
        "fn_source"
    }
}

/// Create a source that calls `f` with the call index until it returns `sentinel`.
///
/// # Example
///
/// ```rust,ignore
/// // 0, 2, 4, 6
/// let evens = from_fn(|i| if i >= 4 { u32::MAX } else { i as u32 * 2 }, u32::MAX);
/// ```
pub fn from_fn<F, T>(f: F, sentinel: T) -> FnSource<F, T>
where
    F: FnMut(usize) -> T + Send + 'static,
    T: PartialEq + Send + 'static,
{
    FnSource {
        f,
        sentinel,
        calls: 0,
        done: false,
    }
}

/// A source that calls an async function until one of its results is a sentinel value.
pub struct AsyncFnSource<F, T> {
    f: F,
    sentinel: Arc<T>,
    calls: usize,
    done: Arc<AtomicBool>,
}

impl<F, Fut, T> Source for AsyncFnSource<F, T>
where
    F: FnMut(usize) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: PartialEq + Send + Sync + 'static,
{
    type Item = T;

    fn pull(&mut self) -> Pull<T> {
        if self.done.load(Ordering::Acquire) {
            return Deferred::ready(Ok(None));
        }

        let fut = (self.f)(self.calls);
        self.calls += 1;
        let sentinel = Arc::clone(&self.sentinel);
        let done = Arc::clone(&self.done);
        Deferred::pending(async move {
            let value = fut.await;
            if value == *sentinel {
                done.store(true, Ordering::Release);
                return Ok(None);
            }
            Ok(Some(value))
        })
    }

    fn name(&self) -> &str {
        "async_fn_source"
    }
}

/// Create a source from an async function, ending at the first `sentinel` result.
///
/// `f` is invoked synchronously, in pull order, for every pull issued before
/// the sentinel has been observed.
pub fn from_async_fn<F, Fut, T>(f: F, sentinel: T) -> AsyncFnSource<F, T>
where
    F: FnMut(usize) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: PartialEq + Send + Sync + 'static,
{
    AsyncFnSource {
        f,
        sentinel: Arc::new(sentinel),
        calls: 0,
        done: Arc::new(AtomicBool::new(false)),
    }
}

// ============================================================================
// Stream Source
// ============================================================================

type Reply<T> = oneshot::Sender<Result<Option<T>>>;

/// A source that reads from an async stream.
///
/// A driver task is spawned on the first pull. It answers pull requests in
/// the order they were issued and reads the stream only when a request is
/// waiting, so nothing is read ahead.
pub struct StreamSource<T> {
    stream: Option<BoxStream<'static, Result<T>>>,
    requests: Option<mpsc::UnboundedSender<Reply<T>>>,
}

impl<T: Send + 'static> StreamSource<T> {
    fn new(stream: BoxStream<'static, Result<T>>) -> Self {
        Self {
            stream: Some(stream),
            requests: None,
        }
    }

    fn requests(&mut self) -> &mpsc::UnboundedSender<Reply<T>> {
        self.requests.get_or_insert_with(|| {
            let stream = self
                .stream
                .take()
                .unwrap_or_else(|| futures::stream::empty().boxed());
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(drive_stream(stream, rx));
            tx
        })
    }
}

impl<T: Send + 'static> Source for StreamSource<T> {
    type Item = T;

    fn pull(&mut self) -> Pull<T> {
        let (reply, response) = oneshot::channel();
        if self.requests().send(reply).is_err() {
            return Deferred::ready(Err(Error::Abandoned));
        }
        Deferred::pending(async move { response.await.unwrap_or(Err(Error::Abandoned)) })
    }

    fn name(&self) -> &str {
        "stream_source"
    }
}

async fn drive_stream<T>(
    mut stream: BoxStream<'static, Result<T>>,
    mut requests: mpsc::UnboundedReceiver<Reply<T>>,
) {
    let mut exhausted = false;
    while let Some(reply) = requests.recv().await {
        let next = if exhausted {
            Ok(None)
        } else {
            match stream.next().await {
                Some(Ok(item)) => Ok(Some(item)),
                Some(Err(e)) => Err(e),
                None => {
                    exhausted = true;
                    Ok(None)
                }
            }
        };
        if reply.send(next).is_err() {
            tracing::trace!("stream pull dropped before its item was delivered");
        }
    }
    tracing::trace!("stream source driver finished");
}

/// Create a source from an infallible stream.
pub fn from_stream<St>(stream: St) -> StreamSource<St::Item>
where
    St: Stream + Send + 'static,
    St::Item: Send + 'static,
{
    StreamSource::new(stream.map(Ok).boxed())
}

/// Create a source from a fallible stream; errors surface as upstream failures.
pub fn from_try_stream<St, T, E>(stream: St) -> StreamSource<T>
where
    St: Stream<Item = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError>,
{
    StreamSource::new(stream.map(|item| item.map_err(Error::upstream)).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::IntoFuture;
    use std::time::Duration;

    async fn drain<S: Source>(mut source: S) -> Vec<S::Item> {
        let mut items = Vec::new();
        while let Some(item) = source.pull().await.unwrap() {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn test_iter_source() {
        let mut source = from_iter(vec![1, 2, 3]);
        assert!(source.pull().is_immediate());
        assert_eq!(drain(source).await, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_iter_source_is_fused() {
        let mut source = from_iter(Vec::<u32>::new());
        assert!(source.pull().await.unwrap().is_none());
        assert!(source.pull().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fn_source_stops_at_sentinel() {
        let mut calls = 0;
        let source = from_fn(
            move |i| {
                calls += 1;
                assert_eq!(calls, i + 1);
                if i >= 4 { -1 } else { i as i64 * 2 }
            },
            -1,
        );
        assert_eq!(drain(source).await, vec![0, 2, 4, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_fn_source_keeps_pull_order() {
        let mut source = from_async_fn(
            |i| async move {
                // Later calls finish first.
                tokio::time::sleep(Duration::from_millis(100 - i as u64 * 10)).await;
                if i >= 3 { None } else { Some(i) }
            },
            None,
        );

        let pulls: Vec<_> = (0..5).map(|_| source.pull().into_future()).collect();
        let results: Vec<_> = futures::future::join_all(pulls)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(
            results,
            vec![Some(Some(0)), Some(Some(1)), Some(Some(2)), None, None]
        );
        // The sentinel has been observed: no more calls.
        assert!(source.pull().is_immediate());
    }

    #[tokio::test]
    async fn test_stream_source_serves_pulls_in_order() {
        let mut source = from_stream(futures::stream::iter(vec!['a', 'b', 'c']));
        let first = source.pull();
        let second = source.pull();
        let third = source.pull();
        let fourth = source.pull();

        // Await out of order; assignment still follows issuance.
        assert_eq!(third.await.unwrap(), Some('c'));
        assert_eq!(first.await.unwrap(), Some('a'));
        assert_eq!(fourth.await.unwrap(), None);
        assert_eq!(second.await.unwrap(), Some('b'));
        assert_eq!(source.pull().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_try_stream_errors_are_upstream_failures() {
        let items: Vec<std::result::Result<u32, std::io::Error>> = vec![
            Ok(1),
            Err(std::io::Error::other("disk gone")),
            Ok(3),
        ];
        let mut source = from_try_stream(futures::stream::iter(items));

        assert_eq!(source.pull().await.unwrap(), Some(1));
        assert!(matches!(source.pull().await, Err(Error::Upstream(_))));
        assert_eq!(source.pull().await.unwrap(), Some(3));
        assert_eq!(source.pull().await.unwrap(), None);
    }
}
