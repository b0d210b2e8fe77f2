// Metrics collection (C10): operation counters, sliding latency window,
// success-rate derivation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

const LATENCY_WINDOW_CAPACITY: usize = 100;

/// Monotonically increasing count, cheap to update from any task.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A point-in-time value set from the outside rather than accumulated,
/// e.g. current LSN or active branch count.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Fixed-capacity FIFO of recent operation latencies. Oldest sample drops
/// once the window fills, so the reported average tracks recent behavior
/// rather than the lifetime mean.
#[derive(Debug, Default)]
pub struct LatencyWindow {
    samples: RwLock<VecDeque<Duration>>,
}

impl LatencyWindow {
    pub fn record(&self, latency: Duration) {
        let mut samples = self.samples.write();
        if samples.len() == LATENCY_WINDOW_CAPACITY {
            samples.pop_front();
        }
        samples.push_back(latency);
    }

    pub fn average(&self) -> Duration {
        let samples = self.samples.read();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = samples.iter().sum();
        total / samples.len() as u32
    }

    pub fn p99(&self) -> Duration {
        let mut samples: Vec<Duration> = self.samples.read().iter().copied().collect();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        samples.sort();
        let idx = ((samples.len() as f64) * 0.99).ceil() as usize;
        samples[idx.saturating_sub(1).min(samples.len() - 1)]
    }

    pub fn sample_count(&self) -> usize {
        self.samples.read().len()
    }
}

/// Per-engine counters plus the latency window, covering every operation
/// the interceptor, materializer, and restore service perform.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub operations_total: Counter,
    pub operations_failed: Counter,
    pub inserts: Counter,
    pub updates: Counter,
    pub deletes: Counter,
    pub materializations: Counter,
    pub restores: Counter,
    pub latency: LatencyWindow,
    pub current_lsn: Gauge,
    pub active_branches: Gauge,
    pub active_projects: Gauge,
}

impl EngineMetrics {
    pub fn record_success(&self, latency: Duration) {
        self.operations_total.inc();
        self.latency.record(latency);
    }

    pub fn record_failure(&self, latency: Duration) {
        self.operations_total.inc();
        self.operations_failed.inc();
        self.latency.record(latency);
    }

    /// Fraction of recorded operations that succeeded, in `[0.0, 1.0]`.
    /// Defined as `1.0` when nothing has been recorded yet, since a fleet
    /// with zero traffic hasn't failed anything either.
    pub fn success_rate(&self) -> f64 {
        let total = self.operations_total.get();
        if total == 0 {
            return 1.0;
        }
        let failed = self.operations_failed.get();
        1.0 - (failed as f64 / total as f64)
    }

    pub fn error_rate(&self) -> f64 {
        1.0 - self.success_rate()
    }
}
