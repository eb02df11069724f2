// worker threads and the state they share with the pool
use super::queue::TaskQueue;
use super::task::{Task, WorkerId};
use crate::config::Config;
use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};
use tracing::{debug, debug_span, warn};

/// Lifecycle of a pool. Only resize/stop move it forward; `Stopped` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Running,
    /// Graceful stop: workers finish the queue, then exit.
    Draining,
    /// Immediate stop: queued work is discarded.
    Stopping,
    Stopped,
}

// wake bookkeeping; tasks are never popped under this lock
#[derive(Debug)]
pub(crate) struct Control {
    pub state: PoolState,
    pub idle: usize,
}

pub(crate) struct Shared {
    pub queue: Arc<dyn TaskQueue>,
    pub control: Mutex<Control>,
    pub wake: Condvar,
}

impl Shared {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            queue,
            control: Mutex::new(Control {
                state: PoolState::Running,
                idle: 0,
            }),
            wake: Condvar::new(),
        }
    }

    /// Wake one parked worker and report the state seen while doing so.
    pub fn wake_one(&self) -> PoolState {
        let control = self.control.lock();
        self.wake.notify_one();
        control.state
    }

    pub fn wake_all(&self) {
        let _control = self.control.lock();
        self.wake.notify_all();
    }
}

/// The pool's view of one worker thread.
///
/// The stop flag is shared with the thread itself, so a worker removed from
/// the pool's collection can still be told to stop after its slot is gone.
pub(crate) struct WorkerHandle {
    id: WorkerId,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn(id: WorkerId, shared: &Arc<Shared>, config: &Config) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            id,
            stop: stop.clone(),
            shared: shared.clone(),
        };

        let mut builder =
            thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread = builder.spawn(move || worker.run())?;

        Ok(Self {
            id,
            stop,
            thread: Some(thread),
        })
    }

    pub fn thread(&self) -> Option<&Thread> {
        self.thread.as_ref().map(|t| t.thread())
    }

    /// Tell the worker to exit after its current task. Never reset.
    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Give up on the thread; it exits on its own once it sees its flag.
    pub fn detach(mut self) {
        drop(self.thread.take());
    }

    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(worker = self.id, "worker thread panicked");
            }
        }
    }
}

struct Worker {
    id: WorkerId,
    stop: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl Worker {
    // main loop
    fn run(self) {
        let _span = debug_span!("worker", id = self.id).entered();
        debug!("worker started");

        loop {
            // drain whatever is queued
            while let Some(task) = self.shared.queue.pop() {
                self.execute(task);
                if self.should_stop() {
                    debug!("worker stopping with work still queued");
                    return;
                }
            }

            if !self.park() {
                break;
            }
        }

        debug!("worker exiting");
    }

    /// Wait until there is work or a reason to exit. Returns false to exit.
    fn park(&self) -> bool {
        let mut control = self.shared.control.lock();
        control.idle += 1;

        while self.shared.queue.is_empty()
            && control.state == PoolState::Running
            && !self.should_stop()
        {
            self.shared.wake.wait(&mut control);
        }

        control.idle -= 1;

        !self.shared.queue.is_empty()
            || (control.state == PoolState::Running && !self.should_stop())
    }

    fn execute(&self, task: Task) {
        // panics are caught inside the task and stored in its handle
        task.run(self.id);
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}
