//! Task execution infrastructure.
//!
//! This module provides the worker threads, the bounded task queue they
//! consume, result handles, and the [`CpuPool`] that ties them together.

pub mod cpu_pool;
pub mod handle;
pub mod panic_handler;
pub mod queue;
pub mod task;
pub mod worker;

pub use cpu_pool::CpuPool;
pub use handle::TaskHandle;
pub use panic_handler::{PanicHandler, PanicInfo, PanicStrategy};
pub use queue::{ChannelQueue, LockedQueue, TaskQueue};
pub use task::{Task, TaskId, WorkerId};
pub use worker::PoolState;
