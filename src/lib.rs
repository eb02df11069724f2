//! VEDA Pool - a resizable worker-thread pool
//!
//! Submit closures to a fixed set of OS threads that consume them from a
//! shared bounded queue, and collect each result through a one-shot handle.
//!
//! # Quick Start
//!
//! ```no_run
//! use veda_pool::prelude::*;
//!
//! let pool = CpuPool::new(4, 100).unwrap();
//!
//! // Every task receives the id of the worker running it
//! let handle = pool.submit(|worker| worker * 10).unwrap();
//! println!("worker result: {}", handle.join().unwrap());
//!
//! pool.resize(8).unwrap();
//! pool.stop(true);
//! ```
//!
//! # Features
//!
//! - **Bounded Queue**: Submissions fail fast when the queue is full
//! - **Result Handles**: Values and panics travel back to the submitter
//! - **Live Resizing**: Grow or shrink the pool without losing queued work
//! - **Graceful or Immediate Stop**: Drain the queue or abandon it
//! - **Pluggable Queue**: Any [`TaskQueue`](executor::TaskQueue) implementation

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder, QueueKind};
pub use error::{Error, Result, TaskError};
pub use executor::{CpuPool, PoolState, TaskHandle};
