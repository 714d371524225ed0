use super::metrics::{QueueMetrics, QueueMetricsSnapshot};
use crate::domain::Event;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Ordered buffer of pending events, shared by probes, schedulers and the
/// termination path.
///
/// Every operation takes the lock exactly once and never awaits while holding
/// it, so `enqueue`, `drain` and `requeue_front` are each observed as a single
/// indivisible step by every other handler.
#[derive(Clone)]
pub struct EventQueue {
    inner: Arc<Mutex<VecDeque<Event>>>,
    metrics: Arc<QueueMetrics>,
    warn_threshold: Option<usize>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
            metrics: Arc::new(QueueMetrics::default()),
            warn_threshold: None,
        }
    }

    /// Logs a warning whenever the queue grows past `threshold`. Nothing is
    /// ever dropped.
    pub fn with_warn_threshold(mut self, threshold: Option<usize>) -> Self {
        self.warn_threshold = threshold;
        self
    }

    /// Appends to the tail.
    pub fn enqueue(&self, event: Event) {
        let len = {
            let mut queue = self.inner.lock();
            queue.push_back(event);
            queue.len()
        };

        self.metrics.record_enqueue(len);
        self.check_growth(len);
    }

    /// Removes and returns the whole current contents, oldest first.
    pub fn drain(&self) -> Vec<Event> {
        let drained: Vec<Event> = std::mem::take(&mut *self.inner.lock()).into();

        if !drained.is_empty() {
            self.metrics.record_drain(drained.len());
            debug!(count = drained.len(), "Drained event queue");
        }
        drained
    }

    /// Puts a previously drained batch back at the head, ahead of anything
    /// enqueued since the drain, keeping the batch's internal order.
    pub fn requeue_front(&self, batch: Vec<Event>) {
        if batch.is_empty() {
            return;
        }

        let count = batch.len();
        let len = {
            let mut queue = self.inner.lock();
            let newer = std::mem::take(&mut *queue);
            queue.extend(batch);
            queue.extend(newer);
            queue.len()
        };

        self.metrics.record_requeue(count, len);
        debug!(count, queue_len = len, "Requeued failed batch at queue head");
        self.check_growth(len);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Copy of the current contents for inspection; the queue is untouched.
    pub fn snapshot(&self) -> Vec<Event> {
        self.inner.lock().iter().cloned().collect()
    }

    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn check_growth(&self, len: usize) {
        if let Some(threshold) = self.warn_threshold
            && len > threshold
        {
            warn!(
                queue_len = len,
                threshold, "Event queue above warning threshold; collector may be unreachable"
            );
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}
