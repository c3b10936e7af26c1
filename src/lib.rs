//! # wpool-rs
//!
//! A worker-pool dispatch and queueing engine modeled on Erlang's `wpool`:
//! a fixed set of worker threads behind a named pool, reached through a
//! choice of dispatch strategies, with an independent queue manager,
//! overrun watchdog, and event callbacks supervising the whole tree.
//!
//! ## Core problem solved
//!
//! A pool of identical workers needs to be reachable under several distinct
//! delivery guarantees without the caller managing threads, channels, or
//! backpressure directly:
//!
//! - **Direct dispatch** picks a worker up front (`best_worker`,
//!   `random_worker`, `next_worker`, `hash_worker`) and hands it the task.
//! - **Queued dispatch** goes through a central queue manager that matches
//!   pending tasks to the next worker that reports itself idle
//!   (`call_available_worker`, `send_request_available_worker`,
//!   `cast_to_available_worker`).
//! - **Broadcast** reaches every worker directly, bypassing the queue.
//! - A supervision tree restarts dead workers one-for-one and rebuilds the
//!   whole pool one-for-all if restarts happen too fast.
//!
//! ## Quick example
//!
//! ```rust,no_run
//! use wpool::config::PoolOptions;
//! use wpool::core::executor::FnExecutor;
//! use wpool::runtime;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), wpool::core::PoolError> {
//! let options = PoolOptions::new().with_workers(4);
//! let executor = FnExecutor::new(|x: i32| async move { x * 2 });
//! runtime::start_link("doubler", options, executor)?;
//!
//! let result: i32 =
//!     runtime::call_available_worker("doubler", 21, Duration::from_secs(1)).await?;
//! assert_eq!(result, 42);
//!
//! runtime::stop::<i32, i32>("doubler")?;
//! # Ok(())
//! # }
//! ```
//!
//! For complete examples, see `tests/pool_test.rs`.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Worker pool internals: tasks, queue manager, workers, supervision tree,
/// the registry, dispatch strategies, and stats.
pub mod core;
/// Configuration models for pools, backends, and timeouts.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// The pool's public API surface: `start_link`, dispatch functions, `stats`,
/// `stop`, and callback registration.
pub mod runtime;
/// Shared utilities.
pub mod util;

