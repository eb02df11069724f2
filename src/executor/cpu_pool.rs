use super::handle::{self, TaskHandle};
use super::panic_handler::PanicHandler;
use super::queue::{ChannelQueue, LockedQueue, TaskQueue};
use super::task::{Task, WorkerId};
use super::worker::{PoolState, Shared, WorkerHandle};
use crate::config::{Config, QueueKind};
use crate::error::{Error, Result, TaskError};
use crate::telemetry::{Metrics, MetricsSnapshot};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::Thread;
use std::time::Instant;
use tracing::{debug, info};

// Everything a task needs while it runs. Kept apart from `Shared` so queued
// tasks never hold a reference back to the queue that stores them.
#[derive(Debug)]
struct TaskContext {
    panics: PanicHandler,
    metrics: Metrics,
}

/// A resizable pool of worker threads fed from a bounded queue.
///
/// `submit` may be called from any number of threads at once. `resize` and
/// `stop` are serialized internally; dropping the pool performs a graceful
/// stop.
///
/// Workers removed by a shrink are not joined unless
/// [`resize_and_join`](Self::resize_and_join) is used: each one finishes the
/// task it is running, if any, and then exits on its own.
pub struct CpuPool {
    shared: Arc<Shared>,
    context: Arc<TaskContext>,
    workers: Mutex<Vec<WorkerHandle>>,
    num_threads: AtomicUsize,
    config: Config,
}

impl CpuPool {
    /// Start `num_threads` workers over a queue holding at most `queue_capacity` tasks.
    pub fn new(num_threads: usize, queue_capacity: usize) -> Result<Self> {
        let config = Config::builder()
            .num_threads(num_threads)
            .queue_capacity(queue_capacity)
            .build()?;
        Self::with_config(&config)
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let queue: Arc<dyn TaskQueue> = match config.queue_kind {
            QueueKind::Channel => Arc::new(ChannelQueue::new(config.queue_capacity)),
            QueueKind::Locked => Arc::new(LockedQueue::new(config.queue_capacity)),
        };
        Self::with_queue(config, queue)
    }

    /// Build a pool over a caller-supplied queue; its capacity overrides the config's.
    pub fn with_queue(config: &Config, queue: Arc<dyn TaskQueue>) -> Result<Self> {
        config.validate()?;

        let pool = Self {
            shared: Arc::new(Shared::new(queue)),
            context: Arc::new(TaskContext {
                panics: PanicHandler::new(config.panic_strategy),
                metrics: Metrics::new(),
            }),
            workers: Mutex::new(Vec::new()),
            num_threads: AtomicUsize::new(0),
            config: config.clone(),
        };

        pool.resize(config.worker_threads())?;
        Ok(pool)
    }

    /// Queue `f` for execution and return a handle to its result.
    ///
    /// `f` receives the id of the worker that runs it. Fails without blocking
    /// when the queue is full or the pool has begun stopping.
    pub fn submit<F, R>(&self, f: F) -> Result<TaskHandle<R>>
    where
        F: FnOnce(WorkerId) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.state() != PoolState::Running {
            return Err(Error::PoolStopped);
        }

        let (tx, rx) = handle::channel::<R>();
        let context = self.context.clone();
        let task = Task::new(move |worker| {
            let start = Instant::now();
            let outcome = context
                .panics
                .execute(|| f(worker))
                .map_err(TaskError::from);
            context.metrics.record_execution(start.elapsed());
            if outcome.is_err() {
                context.metrics.record_panic();
            }
            // the caller may have dropped its handle
            let _ = tx.send(outcome);
        });
        let id = task.id();

        if self.shared.queue.push(task).is_err() {
            let capacity = self.shared.queue.capacity();
            self.context.metrics.record_rejected();
            debug!(capacity, "task queue full, rejecting submission");
            return Err(Error::SubmissionRejected { capacity });
        }

        self.context.metrics.record_submitted();
        if self.shared.wake_one() == PoolState::Stopped {
            // raced with the end of a stop; no worker is left to take it
            self.clear_queue();
        }
        Ok(TaskHandle::new(id, rx))
    }

    /// Grow or shrink the pool to `target` workers.
    ///
    /// Removed workers are signalled and detached. No-op once a stop has begun.
    pub fn resize(&self, target: usize) -> Result<()> {
        self.resize_inner(target, false)
    }

    /// Like [`resize`](Self::resize), but waits for removed workers to exit.
    pub fn resize_and_join(&self, target: usize) -> Result<()> {
        self.resize_inner(target, true)
    }

    fn resize_inner(&self, target: usize, join_removed: bool) -> Result<()> {
        let mut workers = self.workers.lock();
        if self.state() != PoolState::Running {
            return Ok(());
        }

        let current = workers.len();
        if target >= current {
            workers.reserve(target - current);
            for id in current..target {
                let worker = WorkerHandle::spawn(id, &self.shared, &self.config);
                match worker {
                    Ok(worker) => workers.push(worker),
                    Err(e) => {
                        self.num_threads.store(workers.len(), Ordering::Release);
                        return Err(e);
                    }
                }
            }
        } else {
            let removed: Vec<WorkerHandle> = workers.drain(target..).collect();
            for worker in &removed {
                worker.signal_stop();
            }
            // idle workers among the removed ones are parked; let them see their flag
            self.shared.wake_all();

            for worker in removed {
                if join_removed {
                    worker.join();
                } else {
                    worker.detach();
                }
            }
        }

        self.num_threads.store(workers.len(), Ordering::Release);
        if target != current {
            info!(from = current, to = target, joined = join_removed, "pool resized");
        }
        Ok(())
    }

    /// Shut the pool down and wait for every worker to exit.
    ///
    /// With `graceful` set, all queued tasks run first. Otherwise queued tasks
    /// are discarded (their handles report [`TaskError::Abandoned`]) and
    /// workers exit after the task they are currently running. Repeated calls
    /// are no-ops.
    pub fn stop(&self, graceful: bool) {
        let mut workers = self.workers.lock();
        {
            let mut control = self.shared.control.lock();
            if control.state != PoolState::Running {
                return;
            }
            control.state = if graceful {
                PoolState::Draining
            } else {
                PoolState::Stopping
            };
        }

        info!(graceful, workers = workers.len(), "stopping pool");

        if !graceful {
            for worker in workers.iter() {
                worker.signal_stop();
            }
            self.clear_queue();
        }
        self.shared.wake_all();

        for worker in workers.drain(..) {
            worker.join();
        }
        self.num_threads.store(0, Ordering::Release);

        // Publish `Stopped` before the last sweep: a racing submit either lands
        // before it and is swept here, or sees `Stopped` and sweeps itself.
        self.shared.control.lock().state = PoolState::Stopped;
        let leftover = self.clear_queue();

        info!(abandoned = leftover, "pool stopped");
    }

    /// Discard every queued task; returns how many were dropped.
    pub fn clear_queue(&self) -> usize {
        let mut dropped = 0;
        while let Some(task) = self.shared.queue.pop() {
            drop(task);
            dropped += 1;
        }
        if dropped > 0 {
            self.context.metrics.record_abandoned(dropped);
            debug!(dropped, "cleared task queue");
        }
        dropped
    }

    /// Take the next queued task so the caller can run it with [`Task::run`].
    pub fn pop(&self) -> Option<Task> {
        self.shared.queue.pop()
    }

    /// Number of workers; may lag a resize running on another thread.
    pub fn size(&self) -> usize {
        self.num_threads.load(Ordering::Acquire)
    }

    /// Number of workers parked waiting for work.
    pub fn idle_count(&self) -> usize {
        self.shared.control.lock().idle
    }

    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    pub fn state(&self) -> PoolState {
        self.shared.control.lock().state
    }

    /// The thread behind worker slot `i`, for debugging.
    pub fn thread(&self, i: usize) -> Option<Thread> {
        let workers = self.workers.lock();
        workers.get(i).and_then(|w| w.thread().cloned())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.context.metrics.snapshot()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for CpuPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuPool")
            .field("size", &self.size())
            .field("queued", &self.queued())
            .field("capacity", &self.capacity())
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for CpuPool {
    fn drop(&mut self) {
        self.stop(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PanicStrategy;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_submit_returns_value() {
        let pool = CpuPool::new(2, 16).unwrap();
        let handle = pool.submit(|_| 6 * 7).unwrap();
        assert_eq!(handle.join(), Ok(42));
    }

    #[test]
    fn test_worker_id_in_range() {
        let pool = CpuPool::new(3, 64).unwrap();
        let handles: Vec<_> = (0..32).map(|_| pool.submit(|id| id).unwrap()).collect();
        for h in handles {
            assert!(h.join().unwrap() < 3);
        }
    }

    #[test]
    fn test_idle_count_converges() {
        let pool = CpuPool::new(4, 16).unwrap();
        assert_eq!(pool.size(), 4);
        assert!(wait_for(|| pool.idle_count() == 4));
    }

    #[test]
    fn test_zero_workers_keeps_tasks_queued() {
        let pool = CpuPool::new(0, 8).unwrap();
        let handle = pool.submit(|_| "ran").unwrap();
        assert_eq!(pool.queued(), 1);

        pool.resize(1).unwrap();
        assert_eq!(handle.join(), Ok("ran"));
    }

    #[test]
    fn test_rejects_when_full() {
        let pool = CpuPool::new(0, 2).unwrap();
        let _a = pool.submit(|_| ()).unwrap();
        let _b = pool.submit(|_| ()).unwrap();

        let err = pool.submit(|_| ()).unwrap_err();
        assert!(matches!(err, Error::SubmissionRejected { capacity: 2 }));
        assert_eq!(pool.metrics().tasks_rejected, 1);
    }

    #[test]
    fn test_panic_stored_in_handle() {
        let config = Config::builder()
            .num_threads(1)
            .panic_strategy(PanicStrategy::Isolate)
            .build()
            .unwrap();
        let pool = CpuPool::with_config(&config).unwrap();

        let bad = pool.submit(|_| -> i32 { panic!("kaboom") }).unwrap();
        assert_eq!(
            bad.join(),
            Err(TaskError::Panicked {
                message: "kaboom".into()
            })
        );

        let good = pool.submit(|_| 1).unwrap();
        assert_eq!(good.join(), Ok(1));
        assert_eq!(pool.metrics().tasks_panicked, 1);
    }

    #[test]
    fn test_clear_queue_abandons() {
        let pool = CpuPool::new(0, 4).unwrap();
        let handles: Vec<_> = (0..3).map(|i| pool.submit(move |_| i).unwrap()).collect();

        assert_eq!(pool.clear_queue(), 3);
        for h in handles {
            assert_eq!(h.join(), Err(TaskError::Abandoned));
        }
        assert_eq!(pool.metrics().tasks_abandoned, 3);
    }

    #[test]
    fn test_pop_runs_on_caller() {
        let pool = CpuPool::new(0, 4).unwrap();
        let handle = pool.submit(|id| id + 100).unwrap();

        let task = pool.pop().unwrap();
        task.run(5);
        assert_eq!(handle.join(), Ok(105));
        assert!(pool.pop().is_none());
    }

    #[test]
    fn test_shrink_lets_in_flight_task_finish() {
        let pool = CpuPool::new(1, 4).unwrap();
        let release = Arc::new(AtomicBool::new(false));
        let started = Arc::new(AtomicBool::new(false));

        let handle = {
            let release = release.clone();
            let started = started.clone();
            pool.submit(move |_| {
                started.store(true, Ordering::SeqCst);
                while !release.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
                "finished"
            })
            .unwrap()
        };
        assert!(wait_for(|| started.load(Ordering::SeqCst)));

        pool.resize(0).unwrap();
        assert_eq!(pool.size(), 0);

        release.store(true, Ordering::SeqCst);
        assert_eq!(handle.join(), Ok("finished"));
    }

    #[test]
    fn test_resize_and_join_waits_for_removed() {
        let pool = CpuPool::new(4, 8).unwrap();
        assert!(wait_for(|| pool.idle_count() == 4));

        pool.resize_and_join(1).unwrap();
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_thread_accessor() {
        let config = Config::builder()
            .num_threads(2)
            .thread_name_prefix("accessor")
            .build()
            .unwrap();
        let pool = CpuPool::with_config(&config).unwrap();

        let thread = pool.thread(1).unwrap();
        assert_eq!(thread.name(), Some("accessor-1"));
        assert!(pool.thread(2).is_none());
    }

    #[test]
    fn test_stop_is_terminal() {
        let pool = CpuPool::new(2, 8).unwrap();
        pool.stop(true);
        assert_eq!(pool.state(), PoolState::Stopped);
        assert_eq!(pool.size(), 0);

        pool.resize(3).unwrap();
        assert_eq!(pool.size(), 0);
        assert!(matches!(pool.submit(|_| ()), Err(Error::PoolStopped)));

        // second stop is a no-op
        pool.stop(false);
        assert_eq!(pool.state(), PoolState::Stopped);
    }

    #[test]
    fn test_locked_queue_pool() {
        let config = Config::builder()
            .num_threads(2)
            .queue_kind(QueueKind::Locked)
            .queue_capacity(32)
            .build()
            .unwrap();
        let pool = CpuPool::with_config(&config).unwrap();
        let handles: Vec<_> = (0..20u64).map(|i| pool.submit(move |_| i * i).unwrap()).collect();
        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, (0..20u64).map(|i| i * i).sum());
    }
}
