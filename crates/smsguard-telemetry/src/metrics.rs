//! Metrics collection and reporting

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics collector for batch scoring runs
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    batches: AtomicU64,
    batches_cancelled: AtomicU64,
    messages_scored: AtomicU64,
    messages_failed: AtomicU64,
    provider_calls: AtomicU64,
    provider_failures: AtomicU64,
    provider_latency_us: AtomicU64,
    processes_spawned: AtomicU64,
    processes_killed: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                batches: AtomicU64::new(0),
                batches_cancelled: AtomicU64::new(0),
                messages_scored: AtomicU64::new(0),
                messages_failed: AtomicU64::new(0),
                provider_calls: AtomicU64::new(0),
                provider_failures: AtomicU64::new(0),
                provider_latency_us: AtomicU64::new(0),
                processes_spawned: AtomicU64::new(0),
                processes_killed: AtomicU64::new(0),
            }),
        }
    }

    /// Record a batch
    pub fn record_batch(&self) {
        self.inner.batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch that ended in cancellation
    pub fn record_batch_cancelled(&self) {
        self.inner.batches_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message that produced an output record
    pub fn record_message_scored(&self) {
        self.inner.messages_scored.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message reported as a failure
    pub fn record_message_failed(&self) {
        self.inner.messages_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a provider call and its latency
    pub fn record_provider_call(&self, latency_us: u64) {
        self.inner.provider_calls.fetch_add(1, Ordering::Relaxed);
        self.inner
            .provider_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
    }

    /// Record a failed provider call
    pub fn record_provider_failure(&self) {
        self.inner.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a started provider process
    pub fn record_process_spawned(&self) {
        self.inner.processes_spawned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a provider process terminated before it finished
    pub fn record_process_killed(&self) {
        self.inner.processes_killed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches: self.inner.batches.load(Ordering::Relaxed),
            batches_cancelled: self.inner.batches_cancelled.load(Ordering::Relaxed),
            messages_scored: self.inner.messages_scored.load(Ordering::Relaxed),
            messages_failed: self.inner.messages_failed.load(Ordering::Relaxed),
            provider_calls: self.inner.provider_calls.load(Ordering::Relaxed),
            provider_failures: self.inner.provider_failures.load(Ordering::Relaxed),
            provider_latency_us: self.inner.provider_latency_us.load(Ordering::Relaxed),
            processes_spawned: self.inner.processes_spawned.load(Ordering::Relaxed),
            processes_killed: self.inner.processes_killed.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches: u64,
    pub batches_cancelled: u64,
    pub messages_scored: u64,
    pub messages_failed: u64,
    pub provider_calls: u64,
    pub provider_failures: u64,
    pub provider_latency_us: u64,
    pub processes_spawned: u64,
    pub processes_killed: u64,
}

impl MetricsSnapshot {
    /// Average provider call latency
    pub fn avg_provider_latency_us(&self) -> u64 {
        if self.provider_calls == 0 {
            0
        } else {
            self.provider_latency_us / self.provider_calls
        }
    }

    /// Share of messages that could not be scored
    pub fn failure_rate(&self) -> f64 {
        let total = self.messages_scored + self.messages_failed;
        if total == 0 {
            0.0
        } else {
            self.messages_failed as f64 / total as f64
        }
    }
}
