use super::task::{TaskHandle, spawn_interval};
use crate::buffer::{Batch, BatchTrigger, EventQueue};
use crate::domain::Event;
use crate::sender::Transport;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(5);

/// Result of one flush attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued.
    Empty,
    /// Another flush was in flight; queued events wait for the next tick.
    Skipped,
    Delivered { batch_id: String, events: usize },
    /// Delivery failed and the batch went back to the head of the queue.
    Requeued { batch_id: String, events: usize, error: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushStats {
    pub attempts: u64,
    pub delivered: u64,
    pub requeued: u64,
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct FlushCounters {
    attempts: AtomicU64,
    delivered: AtomicU64,
    requeued: AtomicU64,
    skipped: AtomicU64,
}

/// A drained batch that returns itself to the head of the queue unless
/// delivery is confirmed. Covers both send errors and a flush future dropped
/// mid-send.
struct InFlightBatch<'q> {
    queue: &'q EventQueue,
    batch: Option<Batch>,
}

impl<'q> InFlightBatch<'q> {
    fn new(queue: &'q EventQueue, events: Vec<Event>, trigger: BatchTrigger) -> Self {
        Self {
            queue,
            batch: Some(Batch::new(events, trigger)),
        }
    }

    fn batch(&self) -> Option<&Batch> {
        self.batch.as_ref()
    }

    fn confirm(mut self) {
        self.batch = None;
    }
}

impl Drop for InFlightBatch<'_> {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            self.queue.requeue_front(batch.into_events());
        }
    }
}

/// Periodically drains the event queue and hands the batch to the transport.
///
/// On failure the exact batch is requeued at the head and retried on the next
/// scheduled tick, never immediately.
pub struct Batcher {
    queue: EventQueue,
    transport: Arc<dyn Transport>,
    in_flight: Mutex<()>,
    counters: FlushCounters,
}

impl Batcher {
    pub fn new(queue: EventQueue, transport: Arc<dyn Transport>) -> Self {
        Self {
            queue,
            transport,
            in_flight: Mutex::new(()),
            counters: FlushCounters::default(),
        }
    }

    pub async fn flush(&self, trigger: BatchTrigger) -> FlushOutcome {
        let Ok(_gate) = self.in_flight.try_lock() else {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(?trigger, "Flush already in flight, skipping");
            return FlushOutcome::Skipped;
        };

        let events = self.queue.drain();
        if events.is_empty() {
            return FlushOutcome::Empty;
        }

        self.counters.attempts.fetch_add(1, Ordering::Relaxed);
        let pending = InFlightBatch::new(&self.queue, events, trigger);
        let Some(batch) = pending.batch() else {
            return FlushOutcome::Empty;
        };
        let batch_id = batch.id().to_string();
        let count = batch.size();

        match self.transport.send(batch).await {
            Ok(result) => {
                pending.confirm();
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(
                    batch_id = %batch_id,
                    events = count,
                    status = result.status_code,
                    transport = self.transport.name(),
                    "Flush delivered"
                );
                FlushOutcome::Delivered {
                    batch_id,
                    events: count,
                }
            }
            Err(e) => {
                drop(pending);
                self.counters.requeued.fetch_add(1, Ordering::Relaxed);
                warn!(
                    batch_id = %batch_id,
                    events = count,
                    error = %e,
                    "Flush failed, batch requeued for next tick"
                );
                FlushOutcome::Requeued {
                    batch_id,
                    events: count,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Starts the regular flush schedule.
    pub fn start(self: &Arc<Self>, interval: Duration) -> TaskHandle {
        info!(interval_ms = interval.as_millis() as u64, "Starting batch flush schedule");
        let batcher = Arc::clone(self);
        spawn_interval("flush", interval, move || {
            let batcher = Arc::clone(&batcher);
            async move {
                batcher.flush(BatchTrigger::Scheduled).await;
            }
        })
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn stats(&self) -> FlushStats {
        FlushStats {
            attempts: self.counters.attempts.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            requeued: self.counters.requeued.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Batcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("transport", &self.transport.name())
            .field("queue", &self.queue)
            .field("stats", &self.stats())
            .finish()
    }
}
