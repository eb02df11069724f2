//! Bounded storage for pending tasks.
//!
//! The pool only relies on the [`TaskQueue`] contract: a non-blocking push
//! that fails at capacity and a non-blocking pop, both safe to call from any
//! number of threads without extra locking on the caller's side.

use super::task::Task;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use std::collections::VecDeque;

pub trait TaskQueue: Send + Sync {
    /// Enqueue `task`, handing it back when the queue is full.
    fn push(&self, task: Task) -> Result<(), Task>;

    /// Take the next task, if any.
    fn pop(&self) -> Option<Task>;

    fn len(&self) -> usize;

    fn capacity(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded MPMC channel; the queue owns both ends so it never disconnects.
#[derive(Debug)]
pub struct ChannelQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
    capacity: usize,
}

impl ChannelQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }
}

impl TaskQueue for ChannelQueue {
    fn push(&self, task: Task) -> Result<(), Task> {
        match self.tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) | Err(TrySendError::Disconnected(task)) => Err(task),
        }
    }

    fn pop(&self) -> Option<Task> {
        match self.rx.try_recv() {
            Ok(task) => Some(task),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn len(&self) -> usize {
        self.rx.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// FIFO ring buffer behind a mutex.
#[derive(Debug)]
pub struct LockedQueue {
    inner: Mutex<VecDeque<Task>>,
    capacity: usize,
}

impl LockedQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }
}

impl TaskQueue for LockedQueue {
    fn push(&self, task: Task) -> Result<(), Task> {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            return Err(task);
        }
        queue.push_back(task);
        Ok(())
    }

    fn pop(&self) -> Option<Task> {
        self.inner.lock().pop_front()
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn noop() -> Task {
        Task::new(|_| {})
    }

    fn check_capacity(queue: &dyn TaskQueue) {
        assert!(queue.is_empty());
        for _ in 0..queue.capacity() {
            assert!(queue.push(noop()).is_ok());
        }
        assert_eq!(queue.len(), queue.capacity());
        assert!(queue.push(noop()).is_err());

        assert!(queue.pop().is_some());
        assert!(queue.push(noop()).is_ok());

        while queue.pop().is_some() {}
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_channel_queue_capacity() {
        check_capacity(&ChannelQueue::new(4));
    }

    #[test]
    fn test_locked_queue_capacity() {
        check_capacity(&LockedQueue::new(4));
    }

    #[test]
    fn test_locked_queue_is_fifo() {
        let queue = LockedQueue::new(2);
        let first = Task::new(|_| {});
        let first_id = first.id();
        queue.push(first).unwrap();
        queue.push(noop()).unwrap();
        assert_eq!(queue.pop().map(|t| t.id()), Some(first_id));
    }

    #[test]
    fn test_concurrent_producers_and_consumers() {
        let queue: Arc<dyn TaskQueue> = Arc::new(ChannelQueue::new(64));
        let ran = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                let ran = ran.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let ran = ran.clone();
                        let mut task = Task::new(move |_| {
                            ran.fetch_add(1, Ordering::Relaxed);
                        });
                        loop {
                            match queue.push(task) {
                                Ok(()) => break,
                                Err(back) => {
                                    task = back;
                                    thread::yield_now();
                                }
                            }
                        }
                    }
                })
            })
            .collect();

        let mut consumed = 0;
        while consumed < 400 {
            if let Some(task) = queue.pop() {
                task.run(0);
                consumed += 1;
            } else {
                thread::yield_now();
            }
        }

        for p in producers {
            p.join().unwrap();
        }
        assert_eq!(ran.load(Ordering::Relaxed), 400);
        assert!(queue.is_empty());
    }
}
