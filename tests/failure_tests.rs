//! Integration tests for failure locality.
//!
//! A failing pull or user function must fail exactly one slot; every later
//! slot is still delivered, in order.

use std::future::IntoFuture;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use iterly::prelude::*;

fn io_error(msg: &str) -> io::Error {
    io::Error::other(msg.to_string())
}

// ============================================================================
// Upstream Failures
// ============================================================================

#[tokio::test]
async fn test_upstream_failure_reaches_one_slot() {
    let items: Vec<std::result::Result<u32, io::Error>> =
        vec![Ok(1), Err(io_error("read failed")), Ok(3)];
    let mut stage =
        from_try_stream(futures::stream::iter(items)).transform(|v| Deferred::ok(v * 10));

    let first = stage.pull();
    let second = stage.pull();
    let third = stage.pull();
    let fourth = stage.pull();

    assert_eq!(first.await.unwrap(), Some(10));
    match second.await {
        Err(Error::Upstream(source)) => assert_eq!(source.to_string(), "read failed"),
        other => panic!("expected upstream failure, got {other:?}"),
    }
    assert_eq!(third.await.unwrap(), Some(30));
    assert_eq!(fourth.await.unwrap(), None);
}

#[tokio::test]
async fn test_upstream_failure_through_select() {
    let items: Vec<std::result::Result<u32, io::Error>> =
        vec![Ok(2), Err(io_error("gone")), Ok(4), Ok(5)];
    let mut stage =
        from_try_stream(futures::stream::iter(items)).select(|v| Deferred::ok(v % 2 == 0));

    assert_eq!(stage.pull().await.unwrap(), Some(2));
    assert!(matches!(stage.pull().await, Err(Error::Upstream(_))));
    assert_eq!(stage.pull().await.unwrap(), Some(4));
    assert_eq!(stage.pull().await.unwrap(), None);
}

// ============================================================================
// User Function Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failing_slot_does_not_block_later_slots() {
    // The failing item is the slowest; later items settle first and wait.
    let mut stage = from_iter(0..5u64).transform(|v| {
        Deferred::pending(async move {
            if v == 1 {
                tokio::time::sleep(Duration::from_millis(50)).await;
                return Err(BoxError::from(io_error("slot one")));
            }
            Ok(v)
        })
    });

    let pulls: Vec<_> = (0..6).map(|_| stage.pull()).collect();
    let mut results = Vec::new();
    for pull in pulls {
        results.push(pull.await.map_err(|e| e.to_string()));
    }

    assert_eq!(results[0], Ok(Some(0)));
    assert_eq!(
        results[1],
        Err("transform function failed on item 1: slot one".to_string())
    );
    assert_eq!(results[2..], [Ok(Some(2)), Ok(Some(3)), Ok(Some(4)), Ok(None)]);
    assert_eq!(stage.stats().failed, 1);
}

#[tokio::test]
async fn test_windowed_reducer_failure_is_local() {
    let mut sums = from_iter([1u64, 2, 3, 4, 5, 6]).aggregate_windowed(
        |acc: u64, v: u64, _| {
            if v == 3 {
                Deferred::err("three".into())
            } else {
                Deferred::ok(acc + v)
            }
        },
        0,
        2,
    );

    assert_eq!(sums.pull().await.unwrap(), Some(3));
    assert!(matches!(
        sums.pull().await,
        Err(Error::Function { index: 2, .. })
    ));
    assert_eq!(sums.pull().await.unwrap(), Some(11));
    assert_eq!(sums.pull().await.unwrap(), None);
}

#[tokio::test]
async fn test_failure_keeps_stage_name() {
    let stage = Select::with_config(
        from_iter(["x"]),
        |_: &&str| Deferred::err("predicate exploded".into()),
        StageConfig::named("validate"),
    )
    .unwrap();

    match stage.collect().await {
        Err(Error::Function { stage, index, source }) => {
            assert_eq!(stage, "validate");
            assert_eq!(index, 0);
            assert_eq!(source.to_string(), "predicate exploded");
        }
        other => panic!("expected function failure, got {other:?}"),
    }
}

// ============================================================================
// Panics
// ============================================================================

const PATIENCE: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_panicking_transform_fails_one_slot() {
    let mut stage = from_iter(0..3u32).transform(|v| {
        if v == 0 {
            panic!("boom");
        }
        Deferred::ok(v)
    });

    let first = tokio::time::timeout(PATIENCE, stage.pull()).await.unwrap();
    let second = tokio::time::timeout(PATIENCE, stage.pull()).await.unwrap();

    match first {
        Err(Error::Panicked { stage, index, message }) => {
            assert_eq!(stage, "transform");
            assert_eq!(index, 0);
            assert_eq!(message, "boom");
        }
        other => panic!("expected a panicked slot, got {other:?}"),
    }
    assert_eq!(second.unwrap(), Some(1));
    assert_eq!(stage.stats().failed, 1);
}

#[tokio::test]
async fn test_panicking_predicate_fails_one_slot() {
    let mut stage = from_iter([2u32, 3, 4]).select(|v| {
        if *v == 3 {
            panic!("odd one out");
        }
        Deferred::ok(true)
    });

    let pulls: Vec<_> = (0..4).map(|_| stage.pull().into_future()).collect();
    let results = tokio::time::timeout(PATIENCE, futures::future::join_all(pulls))
        .await
        .unwrap();

    assert_eq!(*results[0].as_ref().unwrap(), Some(2));
    assert!(matches!(results[1], Err(Error::Panicked { index: 1, .. })));
    assert_eq!(*results[2].as_ref().unwrap(), Some(4));
    assert_eq!(*results[3].as_ref().unwrap(), None);
}

/// Panics on its second pull, then keeps counting.
struct BrokenOnce {
    next: u32,
}

impl Source for BrokenOnce {
    type Item = u32;

    fn pull(&mut self) -> Pull<u32> {
        let value = self.next;
        self.next += 1;
        match value {
            1 => panic!("sensor offline"),
            0..=3 => Deferred::ok(Some(value)),
            _ => Deferred::ok(None),
        }
    }
}

#[tokio::test]
async fn test_panicking_source_pull_fails_one_slot() {
    let mut stage = BrokenOnce { next: 0 }.transform(|v| Deferred::ok(v * 10));

    let pulls: Vec<_> = (0..5).map(|_| stage.pull().into_future()).collect();
    let results = tokio::time::timeout(PATIENCE, futures::future::join_all(pulls))
        .await
        .unwrap();

    assert_eq!(*results[0].as_ref().unwrap(), Some(0));
    match &results[1] {
        Err(Error::Panicked { index, message, .. }) => {
            assert_eq!(*index, 1);
            assert_eq!(message, "sensor offline");
        }
        other => panic!("expected a panicked slot, got {other:?}"),
    }
    assert_eq!(*results[2].as_ref().unwrap(), Some(20));
    assert_eq!(*results[3].as_ref().unwrap(), Some(30));
    assert_eq!(*results[4].as_ref().unwrap(), None);

    // The stage is still usable after the panic.
    assert_eq!(stage.pull().await.unwrap(), None);
}

// ============================================================================
// Custom Operations
// ============================================================================

/// Rejects items above a limit with an error instead of skipping them.
struct Limit(u32);

impl Operation<u32> for Limit {
    type Output = u32;

    fn run(&self, item: u32, job: JobHandle) -> Deferred<Result<Verdict<u32>>> {
        if item > self.0 {
            Deferred::err(Error::function("limit", job.index(), format!("{item} too large")))
        } else {
            Deferred::ok(Verdict::Deliver(item))
        }
    }
}

#[tokio::test]
async fn test_supervisor_with_custom_operation() {
    let supervisor = Supervisor::new(from_iter([1u32, 50, 2]));
    let op = Arc::new(Limit(10));
    let tickets: Vec<_> = (0..4).map(|_| supervisor.submit(Arc::clone(&op))).collect();

    let results = futures::future::join_all(tickets).await;
    assert_eq!(*results[0].as_ref().unwrap(), Some(1));
    assert!(results[1].is_err());
    assert_eq!(*results[2].as_ref().unwrap(), Some(2));
    assert_eq!(*results[3].as_ref().unwrap(), None);

    let stats = supervisor.stats();
    assert_eq!(stats.issued, 4);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.delivered, 4);
}
