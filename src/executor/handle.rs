//! One-shot result handles returned by `submit`.

use super::task::TaskId;
use crate::error::TaskError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

pub(crate) type ResultSender<T> = Sender<Result<T, TaskError>>;
pub(crate) type ResultReceiver<T> = Receiver<Result<T, TaskError>>;

/// One-slot channel: the sender moves into the task, the receiver into a handle.
pub(crate) fn channel<T>() -> (ResultSender<T>, ResultReceiver<T>) {
    bounded(1)
}

/// Handle to the eventual outcome of a submitted task.
///
/// The task's side of the channel is dropped without sending when the task is
/// discarded unexecuted, which the handle reports as [`TaskError::Abandoned`].
pub struct TaskHandle<T> {
    id: TaskId,
    rx: ResultReceiver<T>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(id: TaskId, rx: ResultReceiver<T>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// True once a value or a panic has been recorded.
    pub fn is_finished(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Block until the task resolves.
    pub fn join(self) -> Result<T, TaskError> {
        self.rx.recv().unwrap_or(Err(TaskError::Abandoned))
    }

    /// Return the outcome if the task has resolved, otherwise the handle itself.
    pub fn try_join(self) -> Result<Result<T, TaskError>, Self> {
        match self.rx.try_recv() {
            Ok(outcome) => Ok(outcome),
            Err(TryRecvError::Disconnected) => Ok(Err(TaskError::Abandoned)),
            Err(TryRecvError::Empty) => Err(self),
        }
    }

    /// Like [`join`](Self::join) but gives the handle back after `timeout`.
    pub fn join_timeout(self, timeout: Duration) -> Result<Result<T, TaskError>, Self> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Ok(outcome),
            Err(RecvTimeoutError::Disconnected) => Ok(Err(TaskError::Abandoned)),
            Err(RecvTimeoutError::Timeout) => Err(self),
        }
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}
