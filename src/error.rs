pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced synchronously at the pool boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("submission rejected: task queue is at capacity ({capacity})")]
    SubmissionRejected { capacity: usize },

    #[error("pool is stopping or stopped")]
    PoolStopped,

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// True when the caller may retry the submission later.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::SubmissionRejected { .. })
    }
}

/// Outcome stored in a task handle when the task did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task panicked: {message}")]
    Panicked { message: String },

    #[error("task abandoned before execution")]
    Abandoned,
}

impl TaskError {
    pub fn is_abandoned(&self) -> bool {
        matches!(self, TaskError::Abandoned)
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked { .. })
    }
}
