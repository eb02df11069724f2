//! Counters and execution-latency histogram for a pool.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Highest latency the histogram tracks: one hour in nanoseconds.
const MAX_TRACKED_NS: u64 = 3_600_000_000_000;

#[derive(Debug)]
pub struct Metrics {
    tasks_submitted: AtomicU64,
    tasks_executed: AtomicU64,
    tasks_panicked: AtomicU64,
    tasks_rejected: AtomicU64,
    tasks_abandoned: AtomicU64,

    busy_time_ns: AtomicU64,

    // None only if the histogram could not be allocated
    latency_histogram: RwLock<Option<Histogram<u64>>>,
}

impl Metrics {
    pub fn new() -> Self {
        let histogram = Histogram::new_with_max(MAX_TRACKED_NS, 3).ok();

        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_executed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            tasks_rejected: AtomicU64::new(0),
            tasks_abandoned: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
            latency_histogram: RwLock::new(histogram),
        }
    }

    pub fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.tasks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self, count: usize) {
        self.tasks_abandoned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one finished task, panicked or not.
    pub fn record_execution(&self, duration: Duration) {
        let duration_ns = duration.as_nanos().min(u64::MAX as u128) as u64;
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
        self.busy_time_ns.fetch_add(duration_ns, Ordering::Relaxed);

        // Skip the sample rather than stall a worker on a contended lock
        if let Some(mut guard) = self.latency_histogram.try_write() {
            if let Some(hist) = guard.as_mut() {
                let _ = hist.record(duration_ns.min(MAX_TRACKED_NS));
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let guard = self.latency_histogram.read();
        let (avg, p50, p99, max) = match guard.as_ref() {
            Some(hist) if hist.len() > 0 => (
                hist.mean() as u64,
                hist.value_at_quantile(0.50),
                hist.value_at_quantile(0.99),
                hist.max(),
            ),
            _ => (0, 0, 0, 0),
        };

        MetricsSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            tasks_abandoned: self.tasks_abandoned.load(Ordering::Relaxed),
            busy_time_ns: self.busy_time_ns.load(Ordering::Relaxed),
            avg_latency_ns: avg,
            p50_latency_ns: p50,
            p99_latency_ns: p99,
            max_latency_ns: max,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of a pool's metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub tasks_submitted: u64,
    pub tasks_executed: u64,
    pub tasks_panicked: u64,
    pub tasks_rejected: u64,
    pub tasks_abandoned: u64,
    pub busy_time_ns: u64,
    pub avg_latency_ns: u64,
    pub p50_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub max_latency_ns: u64,
}

impl MetricsSnapshot {
    /// Accepted tasks that have neither run nor been abandoned.
    pub fn outstanding(&self) -> u64 {
        self.tasks_submitted
            .saturating_sub(self.tasks_executed)
            .saturating_sub(self.tasks_abandoned)
    }
}
