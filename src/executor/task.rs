//! Task representation and execution.

use std::sync::atomic::{AtomicU64, Ordering};

/// Index of the worker slot running a task.
pub type WorkerId = usize;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A deferred unit of work.
///
/// Whoever holds a `Task` owns it outright: dropping it unrun releases the
/// closure and everything it captured, which is how queued work is abandoned.
pub struct Task {
    id: TaskId,
    func: Box<dyn FnOnce(WorkerId) + Send + 'static>,
}

impl Task {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(WorkerId) + Send + 'static,
    {
        Task {
            id: TaskId::next(),
            func: Box::new(f),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Execute the task, passing `worker` as the executing worker's identity.
    pub fn run(self, worker: WorkerId) {
        (self.func)(worker);
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .finish()
    }
}
