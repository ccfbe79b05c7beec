//! # iterly
//!
//! Pipelined, order-preserving combinators over pull-based sequences.
//!
//! A [`Source`](source::Source) is polled one item at a time. The
//! combinators in iterly (transform, select and aggregate) consume a source
//! and expose the same interface, so they chain. Pulling a combinator
//! issues the upstream pull and the per-item work right away, without
//! waiting for earlier items, yet results are always delivered in the order
//! they were requested.
//!
//! ## Features
//!
//! - **Reorder buffer**: a [`Supervisor`](supervisor::Supervisor) runs jobs
//!   concurrently and resolves tickets strictly in issuance order
//! - **Uniform results**: sync and async functions both return a
//!   [`Deferred`](deferred::Deferred)
//! - **Local failures**: one failing item fails only its own slot
//! - **Cancellation**: every stage races its jobs against a
//!   `CancellationToken`
//! - **Observability**: `tracing` events and `metrics` counters per stage
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use iterly::prelude::*;
//!
//! let lengths = from_iter(urls)
//!     .select(|url: &String| Deferred::ok(url.starts_with("https://")))
//!     .transform(|url: String| {
//!         Deferred::pending(async move { Ok(fetch(&url).await?.len()) })
//!     })
//!     .into_buffered_stream(8);
//! ```
//!
//! Pulls spawn tokio tasks, so they must be issued inside a tokio runtime.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod combinators;
pub mod config;
pub mod deferred;
pub mod error;
pub mod observability;
pub mod pipeliner;
pub mod sequential;
pub mod source;
pub mod stream;
pub mod supervisor;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::combinators::{
        Aggregate, Enumerate, Select, Transform, aggregate, enumerate, select, transform,
    };
    pub use crate::config::StageConfig;
    pub use crate::deferred::Deferred;
    pub use crate::error::{BoxError, Error, Fallible, Result};
    pub use crate::source::{
        Pull, Source, SourceExt, from_async_fn, from_fn, from_iter, from_stream, from_try_stream,
    };
    pub use crate::supervisor::{JobHandle, Operation, Supervisor, Ticket, Verdict};
}

pub use error::{Error, Result};
