use crate::error::{Error, Result};
use crate::executor::PanicStrategy;

/// Queue length used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

const MAX_THREADS: usize = 1024;

/// Backing structure for the pool's bounded task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueKind {
    /// Bounded crossbeam channel.
    #[default]
    Channel,
    /// Mutex-guarded ring buffer.
    Locked,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: Option<usize>,
    pub queue_capacity: usize,
    pub queue_kind: QueueKind,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
    pub panic_strategy: PanicStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_kind: QueueKind::default(),
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "veda-worker".to_string(),
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n > MAX_THREADS {
                return Err(Error::config(format!(
                    "num_threads too large (max {})",
                    MAX_THREADS
                )));
            }
        }

        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be > 0"));
        }

        if self.stack_size == Some(0) {
            return Err(Error::config("stack_size must be > 0"));
        }

        Ok(())
    }

    /// Initial worker count; zero is allowed and leaves the pool idle until resized.
    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn queue_kind(mut self, kind: QueueKind) -> Self {
        self.config.queue_kind = kind;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.queue_kind, QueueKind::Channel);
        assert!(config.worker_threads() >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_threads_allowed() {
        let config = Config::builder().num_threads(0).build().unwrap();
        assert_eq!(config.worker_threads(), 0);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::builder().queue_capacity(0).build().is_err());
        assert!(Config::builder().num_threads(4096).build().is_err());
        assert!(Config::builder().stack_size(0).build().is_err());
    }
}
