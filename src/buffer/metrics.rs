use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Lock-free counters kept alongside the event queue.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    enqueued: AtomicU64,
    drained: AtomicU64,
    requeued: AtomicU64,
    peak_len: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueMetricsSnapshot {
    pub enqueued: u64,
    pub drained: u64,
    pub requeued: u64,
    pub peak_len: usize,
}

impl QueueMetrics {
    pub fn record_enqueue(&self, len: usize) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.update_peak(len);
    }

    pub fn record_drain(&self, count: usize) {
        self.drained.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_requeue(&self, count: usize, len: usize) {
        self.requeued.fetch_add(count as u64, Ordering::Relaxed);
        self.update_peak(len);
    }

    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            peak_len: self.peak_len.load(Ordering::Relaxed),
        }
    }

    fn update_peak(&self, len: usize) {
        self.peak_len.fetch_max(len, Ordering::Relaxed);
    }
}
