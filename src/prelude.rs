pub use crate::config::{Config, ConfigBuilder, QueueKind};
pub use crate::error::{Error, Result, TaskError};
pub use crate::executor::{CpuPool, PanicStrategy, PoolState, TaskHandle, WorkerId};
